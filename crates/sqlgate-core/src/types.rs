//! Common types used throughout sqlgate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Timestamp wrapper for consistent handling throughout sqlgate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

/// The kind of operation a candidate statement performs.
///
/// `Create`, `Update` and `Delete` are mutations and always go through
/// human approval. `Read` executes immediately. `Unknown` is what a failed
/// classification collapses to and is never executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    /// Query-only statement.
    Read,
    /// Row insertion.
    Create,
    /// Row modification.
    Update,
    /// Row removal.
    Delete,
    /// The statement could not be classified.
    Unknown,
}

impl OperationKind {
    /// Whether this kind mutates data and therefore requires approval.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }

    /// Whether a mutation of this kind must carry a row filter.
    #[must_use]
    pub fn requires_row_filter(self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }

    /// Map a leading SQL verb to a kind, case-insensitively.
    ///
    /// `CREATE` is DDL, not an insert, and maps to `Unknown` like any other
    /// verb outside the four DML ones.
    #[must_use]
    pub fn from_verb(verb: &str) -> Self {
        match verb.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Self::Read,
            "INSERT" => Self::Create,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => Self::Unknown,
        }
    }

    /// Guess the kind from the leading keyword of a statement.
    #[must_use]
    pub fn infer_from_sql(sql: &str) -> Self {
        sql.split(|c: char| !c.is_ascii_alphabetic())
            .find(|word| !word.is_empty())
            .map_or(Self::Unknown, Self::from_verb)
    }

    /// Canonical upper-case name, as persisted.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(Self::Read),
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(CoreError::InvalidValue {
                kind: "operation kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Risk level attached to a mutation at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Routine change.
    Low,
    /// Sensitive data or otherwise worth a careful look.
    Medium,
    /// Irreversible change such as row removal.
    High,
    /// Affects every row, or is otherwise dangerous.
    Critical,
}

impl RiskLevel {
    /// Raise this level to at least `floor`. Never downgrades.
    #[must_use]
    pub fn at_least(self, floor: Self) -> Self {
        self.max(floor)
    }

    /// Guidance shown to the approver for this level.
    #[must_use]
    pub fn recommendation(self) -> &'static str {
        match self {
            Self::Low => "Operation appears safe to approve",
            Self::Medium => "Review operation carefully before approval",
            Self::High => "Requires thorough review and confirmation",
            Self::Critical => "DO NOT APPROVE without extensive review and backup",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_display_is_rfc3339_seconds() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T08:15:30.250Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Timestamp::from(dt).to_string(), "2024-03-01T08:15:30Z");
    }

    #[test]
    fn test_operation_kind_mutations() {
        assert!(!OperationKind::Read.is_mutation());
        assert!(OperationKind::Create.is_mutation());
        assert!(OperationKind::Update.is_mutation());
        assert!(OperationKind::Delete.is_mutation());
        assert!(!OperationKind::Unknown.is_mutation());

        assert!(!OperationKind::Create.requires_row_filter());
        assert!(OperationKind::Update.requires_row_filter());
        assert!(OperationKind::Delete.requires_row_filter());
    }

    #[test]
    fn test_operation_kind_from_verb() {
        assert_eq!(OperationKind::from_verb("select"), OperationKind::Read);
        assert_eq!(OperationKind::from_verb("INSERT"), OperationKind::Create);
        assert_eq!(OperationKind::from_verb("Update"), OperationKind::Update);
        assert_eq!(OperationKind::from_verb("DELETE"), OperationKind::Delete);
        assert_eq!(OperationKind::from_verb("CREATE"), OperationKind::Unknown);
        assert_eq!(OperationKind::from_verb("MERGE"), OperationKind::Unknown);
    }

    #[test]
    fn test_operation_kind_infer_from_sql() {
        assert_eq!(
            OperationKind::infer_from_sql("  SELECT * FROM employees;"),
            OperationKind::Read
        );
        assert_eq!(
            OperationKind::infer_from_sql("insert into t values (1);"),
            OperationKind::Create
        );
        assert_eq!(
            OperationKind::infer_from_sql("WITH x AS (SELECT 1) SELECT * FROM x;"),
            OperationKind::Unknown
        );
        assert_eq!(
            OperationKind::infer_from_sql("\n(SELECT 1)"),
            OperationKind::Read
        );
        assert_eq!(
            OperationKind::infer_from_sql("CREATE TABLE t (id INTEGER);"),
            OperationKind::Unknown
        );
        assert_eq!(OperationKind::infer_from_sql("  ;"), OperationKind::Unknown);
    }

    #[test]
    fn test_operation_kind_roundtrip_str() {
        for kind in [
            OperationKind::Read,
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::Delete,
            OperationKind::Unknown,
        ] {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
        assert!("read".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_at_least_never_downgrades() {
        assert_eq!(RiskLevel::Low.at_least(RiskLevel::Medium), RiskLevel::Medium);
        assert_eq!(RiskLevel::High.at_least(RiskLevel::Medium), RiskLevel::High);
        assert_eq!(
            RiskLevel::Critical.at_least(RiskLevel::High),
            RiskLevel::Critical
        );
    }

    #[test]
    fn test_risk_level_serializes_upper_case() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
    }
}
