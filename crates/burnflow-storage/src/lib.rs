pub mod error;
pub mod schedule;
pub mod vectors;

pub use error::{Result, StorageError};
pub use schedule::SqliteRelational;
pub use vectors::SqliteVectorStore;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Connection pool cap shared by every pipeline stage.
const MAX_CONNECTIONS: u32 = 30;

/// Open (creating if missing) the burnflow database and run migrations.
pub async fn init_db(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_path)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!(path = db_path, "burnflow DB initialized");
    Ok(pool)
}
