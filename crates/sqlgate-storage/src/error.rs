//! Storage error types.

use sqlgate_core::CoreError;

/// Errors from statement execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The database identifier is not configured.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    /// The backing database could not be opened.
    #[error("failed to open database '{database}': {message}")]
    Connection {
        /// Logical database identifier.
        database: String,
        /// Backend message.
        message: String,
    },

    /// The backend rejected or failed the statement. The message is the
    /// backend's own text.
    #[error("{0}")]
    Statement(String),

    /// The blocking worker failed.
    #[error("storage error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Statement(e.to_string())
    }
}

impl From<CoreError> for StorageError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownDatabase(id) => Self::UnknownDatabase(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
