use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt vector for {kind} {entity_id}: {reason}")]
    CorruptVector {
        kind: String,
        entity_id: i64,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;
