//! Storage errors

use thiserror::Error;

/// Storage result alias
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Insert of a key that already exists
    #[error("{entity} {key} already exists")]
    Duplicate { entity: &'static str, key: String },

    /// Update of a key that does not exist
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    /// Backend failure
    #[error("storage backend error: {0}")]
    Backend(String),
}
