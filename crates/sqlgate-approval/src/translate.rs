//! The natural-language translator contract.
//!
//! Translation itself lives outside the gateway. Whatever backs it (a model,
//! a rule set, a human) implements [`Translator`] and hands back either a
//! [`CandidateStatement`] or a [`ClassificationFailure`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlgate_core::{CandidateStatement, DatabaseId, OperationKind};
use std::fmt;

use crate::context::{ConversationTurn, render_turns};
use crate::tables::affected_tables;

/// Input handed to a [`Translator`].
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// The user's words.
    pub text: String,
    /// Database the statement must target.
    pub database: DatabaseId,
    /// Recent turns, oldest first.
    pub recent_turns: Vec<ConversationTurn>,
    /// Whether `text` appears to refer to an earlier turn.
    pub has_back_reference: bool,
}

impl TranslationRequest {
    /// Recent turns rendered as prompt text.
    #[must_use]
    pub fn rendered_context(&self) -> String {
        render_turns(&self.recent_turns)
    }
}

/// Why a translation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The translator's output could not be read.
    UnparseableOutput,
    /// No statement could be assembled from the output.
    BuildFailed,
    /// The translator itself flagged the statement as dangerous.
    DangerousSql,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Operator-facing hints for this kind of failure.
    #[must_use]
    pub fn suggestions(self) -> Vec<String> {
        let hints: &[&str] = match self {
            Self::DangerousSql => &[
                "Try rephrasing to avoid administrative operations",
                "Use SELECT, INSERT, UPDATE, or DELETE operations only",
            ],
            Self::UnparseableOutput => &[
                "Try simplifying your request",
                "Break complex queries into smaller parts",
                "Be more specific about table and column names",
            ],
            Self::BuildFailed => &[
                "Ensure you're referencing valid table and column names",
                "Check the database schema for available tables",
                "Try a simpler query structure",
            ],
            Self::Other => &[],
        };
        hints.iter().map(|s| (*s).to_owned()).collect()
    }
}

/// A translation that produced no usable statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// What went wrong.
    pub reason: String,
    /// Hints for rephrasing.
    pub suggestions: Vec<String>,
}

impl ClassificationFailure {
    /// Create a failure with the default suggestions for `kind`.
    #[must_use]
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            suggestions: kind.suggestions(),
        }
    }
}

impl fmt::Display for ClassificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for ClassificationFailure {}

/// Turns natural language into a candidate statement.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate one request.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassificationFailure`] if no usable statement results.
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<CandidateStatement, ClassificationFailure>;
}

/// Treats the request text as SQL and classifies it by its leading verb.
///
/// Used by the operator CLI to push raw statements through the gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<CandidateStatement, ClassificationFailure> {
        let kind = OperationKind::infer_from_sql(&request.text);
        if kind == OperationKind::Unknown {
            return Err(ClassificationFailure::new(
                FailureKind::BuildFailed,
                "statement does not start with SELECT, INSERT, UPDATE or DELETE",
            ));
        }

        let mut candidate = CandidateStatement::new(kind, request.database.clone(), &request.text);
        if let [table] = affected_tables(&candidate.sql_text).as_slice() {
            candidate.primary_table.clone_from(table);
        }
        Ok(candidate)
    }
}
