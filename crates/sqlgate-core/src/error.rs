//! Error types shared by the sqlgate crates.

use thiserror::Error;

/// Errors raised while constructing or parsing core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The target database is not part of the configured set.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    /// A persisted or user-supplied value does not name a known variant.
    #[error("invalid {kind}: {value}")]
    InvalidValue {
        /// What was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
