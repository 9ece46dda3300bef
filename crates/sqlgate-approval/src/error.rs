use sqlgate_core::{CoreError, RiskLevel};
use sqlgate_storage::StorageError;

use crate::pending::OperationId;

/// Errors from the durable pending-operation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The SQLite backend failed.
    #[error("pending store error: {0}")]
    Database(String),

    /// Metadata could not be encoded.
    #[error("pending store serialization error: {0}")]
    Serialization(String),

    /// The store file or its directory could not be prepared.
    #[error("pending store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted row could not be decoded.
    #[error("corrupt pending operation {id}: {message}")]
    Corrupt {
        /// Row id.
        id: OperationId,
        /// What failed to decode.
        message: String,
    },

    /// No row with this id exists.
    #[error("pending operation {0} not found")]
    NotFound(OperationId),

    /// Another handle holds the decision claim on this operation.
    #[error("pending operation {0} is being decided elsewhere")]
    Claimed(OperationId),

    /// The claim expired and was taken over before the decision landed.
    #[error("decision claim on pending operation {0} was lost")]
    ClaimLost(OperationId),

    /// Operations can only move out of PENDING.
    #[error("cannot transition an operation back to PENDING")]
    InvalidTransition,

    /// The database was written by a newer schema.
    #[error("unsupported pending store schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion {
        /// Version found on disk.
        found: i64,
        /// Highest version this build understands.
        supported: i64,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned to callers of the gateway.
///
/// Every error is scoped to one request; none of them leave the gateway in
/// a state that affects other requests.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The translator could not produce a usable statement, or the statement
    /// kind is UNKNOWN.
    #[error("could not classify request: {reason}")]
    Classification {
        /// What went wrong.
        reason: String,
        /// Operator-facing hints for rephrasing.
        suggestions: Vec<String>,
    },

    /// The safety validator rejected the statement.
    #[error("unsafe statement ({level}): {reason}")]
    UnsafeStatement {
        /// Matched rule.
        reason: String,
        /// Always CRITICAL today.
        level: RiskLevel,
        /// Operator-facing hints for rephrasing.
        suggestions: Vec<String>,
    },

    /// No pending operation with this id.
    #[error("pending operation {id} not found")]
    NotFound {
        /// Requested id.
        id: OperationId,
    },

    /// The storage collaborator failed. The message is passed through as is.
    #[error(transparent)]
    Execution(#[from] StorageError),

    /// The target database is not configured.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    /// The pending store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound { id },
            other => Self::Store(other),
        }
    }
}

impl From<CoreError> for GatewayError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownDatabase(id) => Self::UnknownDatabase(id),
            other => Self::Classification {
                reason: other.to_string(),
                suggestions: Vec::new(),
            },
        }
    }
}

impl GatewayError {
    /// Whether the caller can fix this by changing the request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Classification { .. }
                | Self::UnsafeStatement { .. }
                | Self::NotFound { .. }
                | Self::UnknownDatabase(_)
        )
    }

    /// Suggestions attached to the error, if any.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Classification { suggestions, .. } | Self::UnsafeStatement { suggestions, .. } => {
                suggestions
            },
            _ => &[],
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
