//! Candidate statements produced by the external translator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::DatabaseId;
use crate::types::OperationKind;

/// Schema-less key/value map carried alongside statements and pending
/// operations. The gateway stores it verbatim and never interprets it.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Normalize a statement for execution and storage.
///
/// Trims surrounding whitespace, strips any trailing terminators and appends
/// exactly one `;`. Everything in between, string literals included, is kept
/// byte for byte.
///
/// # Example
///
/// ```
/// use sqlgate_core::normalize_sql;
///
/// assert_eq!(
///     normalize_sql("  SELECT *\n  FROM employees;;  "),
///     "SELECT *\n  FROM employees;"
/// );
/// ```
#[must_use]
pub fn normalize_sql(sql: &str) -> String {
    let body = sql
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{body};")
}

/// A statement proposed for one natural-language request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStatement {
    /// Declared kind of operation.
    pub operation_kind: OperationKind,
    /// Database the statement targets.
    pub target_database: DatabaseId,
    /// Main table touched; empty for multi-table or complex statements.
    #[serde(default)]
    pub primary_table: String,
    /// The exact, normalized statement to run.
    pub sql_text: String,
    /// Structured hints (joins, grouping, ordering, limit) carried through
    /// for observability.
    #[serde(default)]
    pub auxiliary: Metadata,
}

impl CandidateStatement {
    /// Create a candidate, normalizing the SQL text.
    #[must_use]
    pub fn new(
        operation_kind: OperationKind,
        target_database: DatabaseId,
        sql_text: impl AsRef<str>,
    ) -> Self {
        Self {
            operation_kind,
            target_database,
            primary_table: String::new(),
            sql_text: normalize_sql(sql_text.as_ref()),
            auxiliary: Metadata::new(),
        }
    }

    /// Set the primary table.
    #[must_use]
    pub fn with_primary_table(mut self, table: impl Into<String>) -> Self {
        self.primary_table = table.into();
        self
    }

    /// Attach an auxiliary hint.
    #[must_use]
    pub fn with_hint(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.auxiliary.insert(key.into(), value);
        self
    }
}

impl fmt::Display for CandidateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}@{}] {}",
            self.operation_kind, self.target_database, self.sql_text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_single_terminator() {
        assert_eq!(normalize_sql("SELECT 1"), "SELECT 1;");
        assert_eq!(normalize_sql("SELECT 1;"), "SELECT 1;");
        assert_eq!(normalize_sql("SELECT 1 ; ;"), "SELECT 1;");
    }

    #[test]
    fn test_normalize_keeps_inner_text() {
        assert_eq!(
            normalize_sql("  UPDATE employees SET name = 'Ada  Lovelace;' WHERE emp_id = 1 ;\n"),
            "UPDATE employees SET name = 'Ada  Lovelace;' WHERE emp_id = 1;"
        );
        assert_eq!(
            normalize_sql("SELECT *\n\tFROM employees"),
            "SELECT *\n\tFROM employees;"
        );
    }

    #[test]
    fn test_candidate_new_normalizes() {
        let candidate = CandidateStatement::new(
            OperationKind::Read,
            DatabaseId::new_unchecked("hr"),
            " SELECT * FROM employees ",
        )
        .with_primary_table("employees")
        .with_hint("limit", serde_json::json!(10));

        assert_eq!(candidate.sql_text, "SELECT * FROM employees;");
        assert_eq!(candidate.primary_table, "employees");
        assert_eq!(candidate.auxiliary["limit"], 10);
        assert_eq!(
            candidate.to_string(),
            "[READ@hr] SELECT * FROM employees;"
        );
    }
}
