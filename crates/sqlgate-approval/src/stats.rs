//! Aggregate counts over the pending store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pending::{PendingOperation, PendingStatus};

/// Number of operations listed in [`GatewayStatistics::recent`].
pub const RECENT_LIMIT: usize = 10;

/// Snapshot of the approval queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayStatistics {
    /// All operations ever queued.
    pub total: u64,
    /// Awaiting a decision.
    pub pending: u64,
    /// Approved and executed.
    pub approved: u64,
    /// Rejected.
    pub rejected: u64,
    /// Counts keyed by operation kind.
    pub by_operation: BTreeMap<String, u64>,
    /// Counts keyed by database id.
    pub by_database: BTreeMap<String, u64>,
    /// The most recent operations, newest first.
    pub recent: Vec<PendingOperation>,
}

impl GatewayStatistics {
    /// Aggregate a list of operations ordered by id.
    #[must_use]
    pub fn from_operations(operations: Vec<PendingOperation>) -> Self {
        let mut stats = Self::default();

        for op in &operations {
            stats.total = stats.total.saturating_add(1);
            let slot = match op.status {
                PendingStatus::Pending => &mut stats.pending,
                PendingStatus::Approved => &mut stats.approved,
                PendingStatus::Rejected => &mut stats.rejected,
            };
            *slot = slot.saturating_add(1);
            bump(&mut stats.by_operation, op.operation_kind.as_str());
            bump(&mut stats.by_database, op.target_database.as_str());
        }

        stats.recent = operations.into_iter().rev().take(RECENT_LIMIT).collect();
        stats
    }
}

fn bump(counts: &mut BTreeMap<String, u64>, key: &str) {
    let count = counts.entry(key.to_owned()).or_insert(0);
    *count = count.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::OperationId;
    use sqlgate_core::{DatabaseId, Metadata, OperationKind, Timestamp};

    fn op(id: i64, db: &str, kind: OperationKind, status: PendingStatus) -> PendingOperation {
        PendingOperation {
            id: OperationId(id),
            target_database: DatabaseId::new_unchecked(db),
            operation_kind: kind,
            sql_text: String::new(),
            metadata: Metadata::new(),
            status,
            created_at: Timestamp::now(),
            decided_at: None,
            executed_sql: None,
        }
    }

    #[test]
    fn test_counts() {
        let stats = GatewayStatistics::from_operations(vec![
            op(1, "hr", OperationKind::Update, PendingStatus::Approved),
            op(2, "hr", OperationKind::Delete, PendingStatus::Pending),
            op(3, "finance", OperationKind::Update, PendingStatus::Rejected),
        ]);

        assert_eq!(stats.total, 3);
        assert_eq!((stats.pending, stats.approved, stats.rejected), (1, 1, 1));
        assert_eq!(stats.by_operation["UPDATE"], 2);
        assert_eq!(stats.by_operation["DELETE"], 1);
        assert_eq!(stats.by_database["hr"], 2);
        assert_eq!(stats.recent[0].id, OperationId(3));
    }

    #[test]
    fn test_recent_is_capped() {
        let ops = (1..=15)
            .map(|i| op(i, "hr", OperationKind::Create, PendingStatus::Pending))
            .collect();
        let stats = GatewayStatistics::from_operations(ops);
        assert_eq!(stats.recent.len(), RECENT_LIMIT);
        assert_eq!(stats.recent[0].id, OperationId(15));
        assert_eq!(stats.recent[9].id, OperationId(6));
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            GatewayStatistics::from_operations(Vec::new()),
            GatewayStatistics::default()
        );
    }
}
