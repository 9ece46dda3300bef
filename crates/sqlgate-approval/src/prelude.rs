//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sqlgate_approval::prelude::*;` to import all essential types.

pub use crate::{GatewayError, GatewayResult, StoreError, StoreResult};

pub use crate::{DecisionOutcome, Gateway, OperationDetails, SubmitOutcome};

pub use crate::{OperationId, PendingOperation, PendingOperationStore, PendingStatus};

pub use crate::{RiskAssessment, RiskAssessor, SafetyValidator, SafetyVerdict};

pub use crate::{ContextTracker, ConversationTurn};

pub use crate::{ClassificationFailure, FailureKind, TranslationRequest, Translator};
