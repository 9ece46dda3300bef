//! Safety validator: the textual gate every statement passes first.
//!
//! The validator does not parse SQL. It lower-cases the statement and looks
//! for denylisted substrings, so a keyword inside a string literal or an
//! identifier (`created_at` contains `create`) is still rejected. False
//! positives are accepted; false negatives are what the gate exists to stop.
//!
//! # Check Order
//!
//! 1. Does the statement contain a denylisted substring? -> unsafe, CRITICAL
//! 2. Is it an UPDATE or DELETE with no `where`? -> unsafe, CRITICAL
//! 3. Otherwise -> safe, LOW

use serde::{Deserialize, Serialize};
use sqlgate_core::{OperationKind, RiskLevel};
use std::fmt;

/// Reason reported for an UPDATE or DELETE without a row filter.
pub const MISSING_ROW_FILTER: &str = "mutating statement without row filter affects all rows.";

/// Substrings rejected by [`SafetyValidator::default`].
pub const DEFAULT_DENYLIST: &[&str] = &[
    "drop",
    "truncate",
    "alter",
    "create",
    "shutdown",
    "delete database",
    "attach",
    "detach",
    "replace",
    "grant",
    "revoke",
    "exec(",
    "execute(",
    "pragma",
    "attach database",
];

/// Result of validating one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// Whether the statement may proceed.
    pub safe: bool,
    /// Why the statement was rejected.
    pub reason: Option<String>,
    /// LOW when safe, CRITICAL when not.
    pub level: RiskLevel,
}

impl SafetyVerdict {
    fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
            level: RiskLevel::Low,
        }
    }

    fn unsafe_because(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
            level: RiskLevel::Critical,
        }
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "unsafe ({}): {reason}", self.level),
            None => write!(f, "safe"),
        }
    }
}

/// Case-insensitive keyword gate.
///
/// # Example
///
/// ```
/// use sqlgate_approval::SafetyValidator;
/// use sqlgate_core::{OperationKind, RiskLevel};
///
/// let validator = SafetyValidator::default();
///
/// let verdict = validator.validate("DROP TABLE employees;", OperationKind::Delete);
/// assert!(!verdict.safe);
/// assert_eq!(verdict.level, RiskLevel::Critical);
///
/// let verdict = validator.validate(
///     "UPDATE employees SET salary = 0 WHERE emp_id = 5;",
///     OperationKind::Update,
/// );
/// assert!(verdict.safe);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyValidator {
    denylist: Vec<String>,
}

impl SafetyValidator {
    /// Create a validator with a custom denylist. Entries are matched
    /// case-insensitively; blank entries are dropped.
    #[must_use]
    pub fn new<I, S>(denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denylist: denylist
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// The active denylist, lower-cased.
    #[must_use]
    pub fn denylist(&self) -> &[String] {
        &self.denylist
    }

    /// Validate a statement.
    ///
    /// `kind` is the caller's classification; the validator does not
    /// re-derive it from the text.
    #[must_use]
    pub fn validate(&self, sql: &str, kind: OperationKind) -> SafetyVerdict {
        let lowered = sql.to_lowercase();

        if let Some(keyword) = self.denylist.iter().find(|kw| lowered.contains(kw.as_str())) {
            return SafetyVerdict::unsafe_because(format!("Dangerous keyword detected: {keyword}"));
        }

        if kind.requires_row_filter() && !has_row_filter(&lowered) {
            return SafetyVerdict::unsafe_because(MISSING_ROW_FILTER);
        }

        SafetyVerdict::safe()
    }
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST)
    }
}

/// Textual row-filter check on an already lower-cased statement.
pub(crate) fn has_row_filter(lowered_sql: &str) -> bool {
    lowered_sql.contains("where")
}
