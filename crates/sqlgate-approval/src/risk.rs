//! Risk assessment for mutations that passed the safety gate.

use serde::{Deserialize, Serialize};
use sqlgate_core::{DatabaseId, OperationKind, RiskLevel};
use std::collections::BTreeMap;
use std::fmt;

use crate::safety::has_row_filter;

/// Factor added for every DELETE.
pub const ROW_REMOVAL_FACTOR: &str = "DELETE operation - data will be permanently removed";

/// Factor added for an UPDATE or DELETE without a row filter.
pub const NO_FILTER_FACTOR: &str = "No WHERE clause - affects all rows";

/// Assessment of a mutation, stored with its pending operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// The assessed risk level.
    pub level: RiskLevel,
    /// Contributing conditions, in the order they were found.
    pub factors: Vec<String>,
    /// Guidance for the approver.
    pub recommendation: String,
}

impl RiskAssessment {
    /// Start an assessment at `level` with no factors.
    #[must_use]
    pub fn new(level: RiskLevel) -> Self {
        Self {
            level,
            factors: Vec::new(),
            recommendation: level.recommendation().to_owned(),
        }
    }

    /// Raise the level to at least `floor` and record a factor.
    ///
    /// Never downgrades and never drops earlier factors.
    pub fn escalate(&mut self, floor: RiskLevel, factor: impl Into<String>) {
        self.level = self.level.at_least(floor);
        self.factors.push(factor.into());
        self.recommendation = self.level.recommendation().to_owned();
    }
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            write!(f, "[{}]", self.level)
        } else {
            write!(f, "[{}] {}", self.level, self.factors.join("; "))
        }
    }
}

/// Scores mutations by what they touch and how.
///
/// # Example
///
/// ```
/// use sqlgate_approval::RiskAssessor;
/// use sqlgate_core::{DatabaseId, OperationKind, RiskLevel};
///
/// let assessor = RiskAssessor::default();
/// let assessment = assessor.assess(
///     "DELETE FROM patients;",
///     OperationKind::Delete,
///     &DatabaseId::new_unchecked("healthcare"),
/// );
/// assert_eq!(assessment.level, RiskLevel::Critical);
/// assert_eq!(assessment.factors.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessor {
    sensitive_domains: BTreeMap<String, String>,
}

impl RiskAssessor {
    /// Create an assessor with the given database id → factor map.
    #[must_use]
    pub fn new(sensitive_domains: BTreeMap<String, String>) -> Self {
        Self { sensitive_domains }
    }

    /// Whether a database is in a sensitive domain.
    #[must_use]
    pub fn is_sensitive(&self, database: &DatabaseId) -> bool {
        self.sensitive_domains.contains_key(database.as_str())
    }

    /// Assess a mutation.
    #[must_use]
    pub fn assess(&self, sql: &str, kind: OperationKind, database: &DatabaseId) -> RiskAssessment {
        let mut assessment = RiskAssessment::new(RiskLevel::Low);

        if kind == OperationKind::Delete {
            assessment.escalate(RiskLevel::High, ROW_REMOVAL_FACTOR);
        }

        if kind.requires_row_filter() && !has_row_filter(&sql.to_lowercase()) {
            assessment.escalate(RiskLevel::Critical, NO_FILTER_FACTOR);
        }

        if let Some(factor) = self.sensitive_domains.get(database.as_str()) {
            assessment.escalate(RiskLevel::Medium, factor.clone());
        }

        assessment
    }
}

impl Default for RiskAssessor {
    fn default() -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(
            "finance".to_owned(),
            "Financial data - high sensitivity".to_owned(),
        );
        domains.insert(
            "healthcare".to_owned(),
            "Healthcare data - HIPAA compliance required".to_owned(),
        );
        Self::new(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(id: &str) -> DatabaseId {
        DatabaseId::new_unchecked(id)
    }

    #[test]
    fn test_plain_insert_is_low() {
        let assessment = RiskAssessor::default().assess(
            "INSERT INTO employees (name) VALUES ('Ada');",
            OperationKind::Create,
            &db("hr"),
        );
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(assessment.factors.is_empty());
        assert_eq!(
            assessment.recommendation,
            "Operation appears safe to approve"
        );
    }

    #[test]
    fn test_delete_is_at_least_high() {
        let assessment = RiskAssessor::default().assess(
            "DELETE FROM orders WHERE id = 9;",
            OperationKind::Delete,
            &db("ecommerce"),
        );
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.factors, vec![ROW_REMOVAL_FACTOR]);
    }

    #[test]
    fn test_sensitive_domain_raises_low_to_medium() {
        let assessment = RiskAssessor::default().assess(
            "UPDATE accounts SET flagged = 1 WHERE id = 3;",
            OperationKind::Update,
            &db("finance"),
        );
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert_eq!(assessment.factors, vec!["Financial data - high sensitivity"]);
    }

    #[test]
    fn test_sensitive_domain_never_downgrades() {
        let assessment = RiskAssessor::default().assess(
            "DELETE FROM patients WHERE id = 1;",
            OperationKind::Delete,
            &db("healthcare"),
        );
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.factors.len(), 2);
    }

    #[test]
    fn test_unfiltered_sensitive_delete_is_critical() {
        let assessment = RiskAssessor::default().assess(
            "DELETE FROM patients;",
            OperationKind::Delete,
            &db("healthcare"),
        );
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert!(assessment.factors.contains(&NO_FILTER_FACTOR.to_owned()));
        assert!(
            assessment
                .factors
                .contains(&"Healthcare data - HIPAA compliance required".to_owned())
        );
        assert_eq!(
            assessment.recommendation,
            RiskLevel::Critical.recommendation()
        );
    }

    #[test]
    fn test_custom_domains() {
        let mut domains = BTreeMap::new();
        domains.insert("hr".to_owned(), "Personnel records".to_owned());
        let assessor = RiskAssessor::new(domains);

        assert!(assessor.is_sensitive(&db("hr")));
        assert!(!assessor.is_sensitive(&db("finance")));
    }
}
