//! Pending operations: the unit of the approval workflow.

use serde::{Deserialize, Serialize};
use sqlgate_core::{DatabaseId, Metadata, OperationKind, Timestamp};
use std::fmt;
use std::str::FromStr;

use crate::risk::RiskAssessment;

/// Metadata key holding the original natural-language request.
pub const META_NATURAL_LANGUAGE: &str = "natural_language";
/// Metadata key holding the serialized [`RiskAssessment`].
pub const META_RISK_ASSESSMENT: &str = "risk_assessment";
/// Metadata key holding the affected-table hints.
pub const META_AFFECTED_TABLES: &str = "affected_tables";
/// Metadata key holding the translator's primary table.
pub const META_PRIMARY_TABLE: &str = "primary_table";
/// Metadata key holding the translator's auxiliary hints.
pub const META_AUXILIARY: &str = "auxiliary";

/// Identifier of a pending operation. Dense and strictly increasing per
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub i64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(Self)
    }
}

/// Lifecycle state. APPROVED and REJECTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PendingStatus {
    /// Awaiting a decision.
    Pending,
    /// Executed and approved.
    Approved,
    /// Rejected without execution.
    Rejected,
}

impl PendingStatus {
    /// Persisted name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PendingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A mutation waiting for, or past, its approval decision.
///
/// `target_database`, `operation_kind` and `sql_text` are a snapshot taken
/// at creation and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Store-assigned id.
    pub id: OperationId,
    /// Database the statement runs against.
    pub target_database: DatabaseId,
    /// CREATE, UPDATE or DELETE.
    pub operation_kind: OperationKind,
    /// The statement as submitted.
    pub sql_text: String,
    /// Opaque metadata stored verbatim.
    pub metadata: Metadata,
    /// Current lifecycle state.
    pub status: PendingStatus,
    /// When the operation was queued.
    pub created_at: Timestamp,
    /// When the decision was recorded.
    pub decided_at: Option<Timestamp>,
    /// Statement actually executed on approval: `sql_text` for a plain
    /// approval, the replacement for a modified one. `None` otherwise.
    pub executed_sql: Option<String>,
}

impl PendingOperation {
    /// The risk assessment stored at creation, if present and well-formed.
    #[must_use]
    pub fn risk_assessment(&self) -> Option<RiskAssessment> {
        self.metadata
            .get(META_RISK_ASSESSMENT)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The natural-language request that produced this operation.
    #[must_use]
    pub fn natural_language(&self) -> Option<&str> {
        self.metadata
            .get(META_NATURAL_LANGUAGE)
            .and_then(serde_json::Value::as_str)
    }

    /// Whether a decision is still outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PendingStatus::Pending
    }
}

impl fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {}@{}: {}",
            self.id, self.status, self.operation_kind, self.target_database, self.sql_text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::RiskLevel;

    fn operation(metadata: Metadata) -> PendingOperation {
        PendingOperation {
            id: OperationId(4),
            target_database: DatabaseId::new_unchecked("hr"),
            operation_kind: OperationKind::Update,
            sql_text: "UPDATE employees SET salary = 1 WHERE emp_id = 2;".to_owned(),
            metadata,
            status: PendingStatus::Pending,
            created_at: Timestamp::now(),
            decided_at: None,
            executed_sql: None,
        }
    }

    #[test]
    fn test_status_parse_and_terminal() {
        assert_eq!("approved".parse::<PendingStatus>(), Ok(PendingStatus::Approved));
        assert!("done".parse::<PendingStatus>().is_err());
        assert!(!PendingStatus::Pending.is_terminal());
        assert!(PendingStatus::Approved.is_terminal());
        assert!(PendingStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_operation_id_parse() {
        assert_eq!("#12".parse::<OperationId>().unwrap(), OperationId(12));
        assert_eq!(" 7 ".parse::<OperationId>().unwrap(), OperationId(7));
        assert!("x".parse::<OperationId>().is_err());
    }

    #[test]
    fn test_metadata_accessors() {
        let mut metadata = Metadata::new();
        metadata.insert(
            META_NATURAL_LANGUAGE.to_owned(),
            serde_json::json!("give Bob a raise"),
        );
        metadata.insert(
            META_RISK_ASSESSMENT.to_owned(),
            serde_json::to_value(RiskAssessment::new(RiskLevel::Medium)).unwrap(),
        );

        let op = operation(metadata);
        assert_eq!(op.natural_language(), Some("give Bob a raise"));
        assert_eq!(op.risk_assessment().unwrap().level, RiskLevel::Medium);
        assert!(op.is_pending());
    }

    #[test]
    fn test_malformed_assessment_is_ignored() {
        let mut metadata = Metadata::new();
        metadata.insert(META_RISK_ASSESSMENT.to_owned(), serde_json::json!("HIGH"));
        assert!(operation(metadata).risk_assessment().is_none());
    }

    #[test]
    fn test_display() {
        let op = operation(Metadata::new());
        assert_eq!(
            op.to_string(),
            "#4 [PENDING] UPDATE@hr: UPDATE employees SET salary = 1 WHERE emp_id = 2;"
        );
    }
}
