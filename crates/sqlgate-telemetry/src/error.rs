//! Telemetry error types.

use std::path::PathBuf;

/// Errors raised while installing the log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A level or directive is not valid `EnvFilter` syntax.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// The rejected level or directive.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A format name is not one of pretty, compact, json or full.
    #[error("unknown log format '{0}'")]
    UnknownFormat(String),

    /// The log directory could not be created.
    #[error("cannot create log directory {}: {source}", path.display())]
    LogDirectory {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
