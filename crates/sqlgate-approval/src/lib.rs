//! sqlgate Approval - Human-in-the-loop gateway for generated SQL.
//!
//! Statements produced from natural language pass a textual safety gate.
//! Reads then run immediately; mutations are scored, persisted as pending
//! operations and only executed after an explicit approval, at most once.
//!
//! # Components
//!
//! - [`SafetyValidator`]: denylist and row-filter checks
//! - [`RiskAssessor`]: LOW to CRITICAL scoring with contributing factors
//! - [`PendingOperationStore`]: durable SQLite queue and audit trail
//! - [`ContextTracker`]: bounded log of recent turns for the translator
//! - [`Gateway`]: the dispatcher tying them together
//!
//! # Example
//!
//! ```
//! use sqlgate_approval::{RiskAssessor, SafetyValidator};
//! use sqlgate_core::{DatabaseId, OperationKind, RiskLevel};
//!
//! let sql = "UPDATE accounts SET balance = 0 WHERE account_id = 7;";
//!
//! let verdict = SafetyValidator::default().validate(sql, OperationKind::Update);
//! assert!(verdict.safe);
//!
//! let assessment = RiskAssessor::default().assess(
//!     sql,
//!     OperationKind::Update,
//!     &DatabaseId::new_unchecked("finance"),
//! );
//! assert_eq!(assessment.level, RiskLevel::Medium);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod context;
/// Error types and results for the gateway and its store.
pub mod error;
pub mod gateway;
pub mod pending;
pub mod risk;
pub mod safety;
pub mod stats;
pub mod store;
pub mod tables;
pub mod translate;

pub use context::{ContextTracker, ConversationTurn, TurnResult, TurnStatus};
pub use error::{GatewayError, GatewayResult, StoreError, StoreResult};
pub use gateway::{DecisionOutcome, Gateway, OperationDetails, SubmitOutcome};
pub use pending::{OperationId, PendingOperation, PendingStatus};
pub use risk::{NO_FILTER_FACTOR, ROW_REMOVAL_FACTOR, RiskAssessment, RiskAssessor};
pub use safety::{DEFAULT_DENYLIST, MISSING_ROW_FILTER, SafetyValidator, SafetyVerdict};
pub use stats::GatewayStatistics;
pub use store::{
    CLAIM_TTL, Claim, DecisionClaim, DecisionLock, PendingOperationStore, Transition,
};
pub use tables::affected_tables;
pub use translate::{
    ClassificationFailure, FailureKind, PassthroughTranslator, TranslationRequest, Translator,
};
