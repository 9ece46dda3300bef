//! The statement execution contract the gateway runs against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlgate_core::DatabaseId;

use crate::error::StorageResult;

/// One result row, column name → value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A table and its current row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    /// Table name.
    pub name: String,
    /// Number of rows.
    pub row_count: u64,
}

/// Executes already-approved or read-only statements against a logical
/// database.
///
/// Calls are not cancellable once issued; callers that need a deadline wrap
/// the future in their own timeout.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Run a query and return its rows.
    async fn query(&self, database: &DatabaseId, sql: &str) -> StorageResult<Vec<Row>>;

    /// Run a mutating statement and return the number of affected rows.
    async fn execute(&self, database: &DatabaseId, sql: &str) -> StorageResult<u64>;
}
