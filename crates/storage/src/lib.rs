pub mod json;
pub mod repository;
pub mod sqlite;

pub use json::JsonFileRepository;
pub use repository::{InMemoryRepository, SessionRepository, Storage, StorageError};
pub use sqlite::{SqliteInitError, SqliteRepository};
