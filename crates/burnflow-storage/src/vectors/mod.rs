pub mod repository;

pub use repository::SqliteVectorStore;
