//! Gateway dispatcher: the request state machine.
//!
//! # Submission
//!
//! 1. Resolve the target database; unknown ids stop here
//! 2. Translate the request (external [`Translator`])
//! 3. UNKNOWN kind -> classification error
//! 4. Safety validator; unsafe -> error, nothing stored
//! 5. READ -> execute now and return rows
//! 6. Mutation -> assess risk, queue as PENDING, return the id
//!
//! # Decision
//!
//! 1. Take the per-id decision lock, then the durable claim on the row
//! 2. Not found -> error; already decided -> report current state
//! 3. Approve -> execute, then mark APPROVED with the statement that ran.
//!    A failed execution releases the claim and leaves the operation PENDING
//!    so the approval can be retried
//! 4. Reject -> mark REJECTED, nothing executes

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlgate_core::{
    CandidateStatement, DatabaseId, DatabaseRegistry, Metadata, OperationKind, normalize_sql,
};
use sqlgate_storage::{Row, StatementExecutor};
use sqlgate_telemetry::RequestContext;
use tracing::{Instrument, debug, error, info, warn};

use crate::context::{ContextTracker, ConversationTurn, TurnResult, TurnStatus};
use crate::error::{GatewayError, GatewayResult, StoreError};
use crate::pending::{
    META_AFFECTED_TABLES, META_AUXILIARY, META_NATURAL_LANGUAGE, META_PRIMARY_TABLE,
    META_RISK_ASSESSMENT, OperationId, PendingOperation, PendingStatus,
};
use crate::risk::{RiskAssessment, RiskAssessor};
use crate::safety::SafetyValidator;
use crate::stats::GatewayStatistics;
use crate::store::{Claim, PendingOperationStore, Transition};
use crate::tables::affected_tables;
use crate::translate::{FailureKind, TranslationRequest, Translator};

/// Default number of turns handed to the translator.
pub const DEFAULT_PROMPT_TURNS: usize = 3;

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A read ran immediately.
    Executed {
        /// The statement that ran.
        candidate: CandidateStatement,
        /// Returned rows.
        rows: Vec<Row>,
    },
    /// A mutation was queued for approval. Nothing has executed.
    PendingApproval {
        /// Handle for the approval decision.
        id: OperationId,
        /// Assessment stored with the operation.
        assessment: RiskAssessment,
        /// The queued statement.
        candidate: CandidateStatement,
    },
}

impl SubmitOutcome {
    /// The pending id, if the submission was queued.
    #[must_use]
    pub fn pending_id(&self) -> Option<OperationId> {
        match self {
            Self::PendingApproval { id, .. } => Some(*id),
            Self::Executed { .. } => None,
        }
    }

    /// The statement that ran or was queued.
    #[must_use]
    pub fn candidate(&self) -> &CandidateStatement {
        match self {
            Self::Executed { candidate, .. } | Self::PendingApproval { candidate, .. } => candidate,
        }
    }
}

/// Result of an approval decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The statement executed and the operation is APPROVED.
    Approved {
        /// Decided operation.
        id: OperationId,
        /// Rows changed by the statement.
        rows_affected: u64,
        /// Statement that actually ran.
        executed_sql: String,
        /// Whether an operator replacement ran instead of the queued SQL.
        modified: bool,
    },
    /// The operation is REJECTED.
    Rejected {
        /// Decided operation.
        id: OperationId,
    },
    /// The operation was already decided. Nothing executed or changed.
    AlreadyProcessed {
        /// Current state of the operation.
        operation: PendingOperation,
    },
}

impl DecisionOutcome {
    /// Whether this call changed the operation's status.
    #[must_use]
    pub fn is_transition(&self) -> bool {
        !matches!(self, Self::AlreadyProcessed { .. })
    }
}

/// One operation with its review context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDetails {
    /// The stored operation.
    pub operation: PendingOperation,
    /// Assessment stored at creation, or a fresh one if it is missing.
    pub assessment: RiskAssessment,
    /// Approver guidance for the assessed level.
    pub recommendation: String,
    /// Tables the statement references.
    pub affected_tables: Vec<String>,
}

enum Decision {
    Approve { replacement: Option<String> },
    Reject,
}

/// The HITL gateway.
///
/// Owns no global state: the store, executor, translator and context
/// tracker are injected, so several gateways can run side by side.
pub struct Gateway {
    registry: Arc<DatabaseRegistry>,
    store: Arc<PendingOperationStore>,
    executor: Arc<dyn StatementExecutor>,
    translator: Arc<dyn Translator>,
    validator: SafetyValidator,
    assessor: RiskAssessor,
    context: Arc<ContextTracker>,
    prompt_turns: usize,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .field("validator", &self.validator)
            .field("assessor", &self.assessor)
            .field("prompt_turns", &self.prompt_turns)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway with the default validator, assessor and context
    /// tracker.
    #[must_use]
    pub fn new(
        registry: Arc<DatabaseRegistry>,
        store: Arc<PendingOperationStore>,
        executor: Arc<dyn StatementExecutor>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            registry,
            store,
            executor,
            translator,
            validator: SafetyValidator::default(),
            assessor: RiskAssessor::default(),
            context: Arc::new(ContextTracker::default()),
            prompt_turns: DEFAULT_PROMPT_TURNS,
        }
    }

    /// Replace the safety validator.
    #[must_use]
    pub fn with_validator(mut self, validator: SafetyValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the risk assessor.
    #[must_use]
    pub fn with_assessor(mut self, assessor: RiskAssessor) -> Self {
        self.assessor = assessor;
        self
    }

    /// Share a context tracker with other components.
    #[must_use]
    pub fn with_context_tracker(mut self, context: Arc<ContextTracker>) -> Self {
        self.context = context;
        self
    }

    /// Set how many recent turns the translator sees.
    #[must_use]
    pub fn with_prompt_turns(mut self, turns: usize) -> Self {
        self.prompt_turns = turns;
        self
    }

    /// The configured databases.
    #[must_use]
    pub fn registry(&self) -> &DatabaseRegistry {
        &self.registry
    }

    /// The pending store.
    #[must_use]
    pub fn store(&self) -> &PendingOperationStore {
        &self.store
    }

    /// Translate and dispatch one natural-language request.
    ///
    /// The turn is recorded in the context tracker whatever the outcome,
    /// except when the database is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDatabase`] before translating,
    /// [`GatewayError::Classification`] if translation fails, or any error
    /// from [`Gateway::dispatch`].
    pub async fn submit(&self, text: &str, database: &str) -> GatewayResult<SubmitOutcome> {
        let database = self.registry.resolve(database)?;
        let ctx = RequestContext::new("gateway")
            .with_operation("submit")
            .with_database(database.as_str());

        self.translate_and_dispatch(text, &database)
            .instrument(ctx.span())
            .await
    }

    async fn translate_and_dispatch(
        &self,
        text: &str,
        database: &DatabaseId,
    ) -> GatewayResult<SubmitOutcome> {
        let request = TranslationRequest {
            text: text.to_owned(),
            database: database.clone(),
            recent_turns: self.context.recent(self.prompt_turns),
            has_back_reference: ContextTracker::has_back_reference(text),
        };
        debug!(
            back_reference = request.has_back_reference,
            turns = request.recent_turns.len(),
            "translating request"
        );

        let mut candidate = match self.translator.translate(&request).await {
            Ok(candidate) => candidate,
            Err(failure) => {
                warn!(kind = ?failure.kind, reason = %failure.reason, "translation failed");
                let status = TurnStatus::Failed {
                    reason: failure.reason.clone(),
                };
                self.record_turn(text, database, OperationKind::Unknown, None, status);
                return Err(GatewayError::Classification {
                    reason: failure.reason,
                    suggestions: failure.suggestions,
                });
            },
        };

        if candidate.target_database != *database {
            warn!(
                returned = %candidate.target_database,
                "translator targeted a different database, overriding"
            );
            candidate.target_database = database.clone();
        }

        let operation = candidate.operation_kind;
        let sql = candidate.sql_text.clone();
        let result = self.dispatch(candidate, Some(text)).await;
        let status = match &result {
            Ok(SubmitOutcome::Executed { rows, .. }) => TurnStatus::Executed { rows: rows.len() },
            Ok(SubmitOutcome::PendingApproval { id, .. }) => TurnStatus::PendingApproval { id: *id },
            Err(e) => TurnStatus::Failed {
                reason: e.to_string(),
            },
        };
        self.record_turn(text, database, operation, Some(sql), status);
        result
    }

    /// Dispatch an already-translated statement.
    ///
    /// `natural_language` is stored with queued mutations when given.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDatabase`],
    /// [`GatewayError::Classification`] for UNKNOWN statements,
    /// [`GatewayError::UnsafeStatement`], [`GatewayError::Execution`] if a
    /// read fails, or a store error if a mutation cannot be queued.
    pub async fn dispatch(
        &self,
        candidate: CandidateStatement,
        natural_language: Option<&str>,
    ) -> GatewayResult<SubmitOutcome> {
        if !self.registry.contains(candidate.target_database.as_str()) {
            return Err(GatewayError::UnknownDatabase(candidate.target_database.to_string()));
        }

        let kind = candidate.operation_kind;
        if kind == OperationKind::Unknown {
            return Err(GatewayError::Classification {
                reason: "could not determine the operation kind of the statement".to_owned(),
                suggestions: FailureKind::UnparseableOutput.suggestions(),
            });
        }

        let verdict = self.validator.validate(&candidate.sql_text, kind);
        if !verdict.safe {
            let reason = verdict.reason.unwrap_or_default();
            warn!(database = %candidate.target_database, operation = %kind, %reason, "statement rejected by safety validator");
            return Err(GatewayError::UnsafeStatement {
                reason,
                level: verdict.level,
                suggestions: FailureKind::DangerousSql.suggestions(),
            });
        }

        if !kind.is_mutation() {
            let rows = self
                .executor
                .query(&candidate.target_database, &candidate.sql_text)
                .await?;
            info!(database = %candidate.target_database, rows = rows.len(), "read executed");
            return Ok(SubmitOutcome::Executed { candidate, rows });
        }

        let assessment =
            self.assessor
                .assess(&candidate.sql_text, kind, &candidate.target_database);
        let metadata = build_metadata(&candidate, &assessment, natural_language)?;
        let id = self.store.create(
            &candidate.target_database,
            kind,
            &candidate.sql_text,
            &metadata,
        )?;
        info!(%id, level = %assessment.level, "mutation queued for approval");

        Ok(SubmitOutcome::PendingApproval {
            id,
            assessment,
            candidate,
        })
    }

    /// Approve or reject a pending operation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown id or
    /// [`GatewayError::Execution`] if the approved statement fails, in which
    /// case the operation stays PENDING.
    pub async fn decide(&self, id: OperationId, approve: bool) -> GatewayResult<DecisionOutcome> {
        let decision = if approve {
            Decision::Approve { replacement: None }
        } else {
            Decision::Reject
        };
        self.apply_decision(id, decision).await
    }

    /// Approve a pending operation, running `sql` in place of the queued
    /// statement.
    ///
    /// The replacement is normalized but not re-validated.
    ///
    /// # Errors
    ///
    /// Same as [`Gateway::decide`], plus [`GatewayError::Classification`]
    /// for an empty replacement.
    pub async fn approve_with_modification(
        &self,
        id: OperationId,
        sql: &str,
    ) -> GatewayResult<DecisionOutcome> {
        if sql.trim().trim_end_matches(';').trim().is_empty() {
            return Err(GatewayError::Classification {
                reason: "replacement statement is empty".to_owned(),
                suggestions: Vec::new(),
            });
        }
        self.apply_decision(
            id,
            Decision::Approve {
                replacement: Some(normalize_sql(sql)),
            },
        )
        .await
    }

    async fn apply_decision(
        &self,
        id: OperationId,
        decision: Decision,
    ) -> GatewayResult<DecisionOutcome> {
        let label = match decision {
            Decision::Approve { .. } => "approve",
            Decision::Reject => "reject",
        };
        let ctx = RequestContext::new("gateway")
            .with_operation(label)
            .with_metadata("id", id.to_string());

        let span = ctx.span();
        let outcome = self.decide_locked(id, decision).instrument(span.clone()).await;
        span.in_scope(|| debug!(elapsed_ms = ctx.elapsed_ms(), "decision finished"));
        outcome
    }

    async fn decide_locked(
        &self,
        id: OperationId,
        decision: Decision,
    ) -> GatewayResult<DecisionOutcome> {
        let _lock = self.store.lock_decision(id).await;

        let (claim, operation) = match self.store.claim(id).await? {
            Claim::Decided(operation) => {
                info!(%id, status = %operation.status, "decision on already processed operation");
                return Ok(DecisionOutcome::AlreadyProcessed { operation });
            },
            Claim::Acquired(claim, operation) => (claim, operation),
        };

        match decision {
            Decision::Reject => {
                let transition = self.store.complete(claim, PendingStatus::Rejected, None)?;
                self.finish(id, transition, DecisionOutcome::Rejected { id })
            },
            Decision::Approve { replacement } => {
                let modified = replacement.is_some();
                if modified {
                    warn!(%id, "executing operator-modified statement without re-validation");
                }
                let sql = replacement.unwrap_or_else(|| operation.sql_text.clone());

                let rows_affected = match self
                    .executor
                    .execute(&operation.target_database, &sql)
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        error!(%id, error = %e, "approved statement failed, operation stays pending");
                        if let Err(release) = self.store.release(claim) {
                            warn!(%id, error = %release, "failed to release decision claim");
                        }
                        return Err(GatewayError::Execution(e));
                    },
                };

                let transition =
                    self.store
                        .complete(claim, PendingStatus::Approved, Some(sql.as_str()))?;
                self.finish(
                    id,
                    transition,
                    DecisionOutcome::Approved {
                        id,
                        rows_affected,
                        executed_sql: sql,
                        modified,
                    },
                )
            },
        }
    }

    fn finish(
        &self,
        id: OperationId,
        transition: Transition,
        outcome: DecisionOutcome,
    ) -> GatewayResult<DecisionOutcome> {
        match transition {
            Transition::Applied => Ok(outcome),
            Transition::AlreadyFinal(status) => {
                // Another store handle on the same file decided first.
                warn!(%id, %status, "operation decided concurrently");
                let operation = self.store.get(id)?.ok_or(StoreError::NotFound(id))?;
                Ok(DecisionOutcome::AlreadyProcessed { operation })
            },
        }
    }

    /// Pending operations ordered by id, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns a store error if the listing fails.
    pub fn list(&self, status: Option<PendingStatus>) -> GatewayResult<Vec<PendingOperation>> {
        Ok(self.store.list(status)?)
    }

    /// Fetch one operation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown id.
    pub fn get(&self, id: OperationId) -> GatewayResult<PendingOperation> {
        self.store.get(id)?.ok_or(GatewayError::NotFound { id })
    }

    /// Fetch one operation with its assessment and affected tables.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown id.
    pub fn details(&self, id: OperationId) -> GatewayResult<OperationDetails> {
        let operation = self.get(id)?;
        let assessment = operation.risk_assessment().unwrap_or_else(|| {
            debug!(%id, "no stored assessment, assessing now");
            self.assessor
                .assess(&operation.sql_text, operation.operation_kind, &operation.target_database)
        });
        let tables = operation
            .metadata
            .get(META_AFFECTED_TABLES)
            .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
            .unwrap_or_else(|| affected_tables(&operation.sql_text));

        Ok(OperationDetails {
            recommendation: assessment.recommendation.clone(),
            assessment,
            affected_tables: tables,
            operation,
        })
    }

    /// Aggregate counts over the store.
    ///
    /// # Errors
    ///
    /// Returns a store error if the listing fails.
    pub fn statistics(&self) -> GatewayResult<GatewayStatistics> {
        Ok(GatewayStatistics::from_operations(self.store.list(None)?))
    }

    /// Every turn currently held by the context tracker, oldest first.
    #[must_use]
    pub fn context(&self) -> Vec<ConversationTurn> {
        self.context.recent(self.context.capacity())
    }

    /// Empty the context tracker.
    pub fn clear_context(&self) {
        self.context.clear();
        info!("conversation context cleared");
    }

    fn record_turn(
        &self,
        text: &str,
        database: &DatabaseId,
        operation: OperationKind,
        sql: Option<String>,
        status: TurnStatus,
    ) {
        self.context.record(ConversationTurn::new(
            text,
            database.clone(),
            TurnResult {
                operation,
                sql,
                status,
            },
        ));
    }
}

fn build_metadata(
    candidate: &CandidateStatement,
    assessment: &RiskAssessment,
    natural_language: Option<&str>,
) -> GatewayResult<Metadata> {
    let mut metadata = Metadata::new();
    if let Some(text) = natural_language {
        metadata.insert(META_NATURAL_LANGUAGE.to_owned(), text.into());
    }
    if !candidate.primary_table.is_empty() {
        metadata.insert(
            META_PRIMARY_TABLE.to_owned(),
            candidate.primary_table.clone().into(),
        );
    }
    if !candidate.auxiliary.is_empty() {
        metadata.insert(
            META_AUXILIARY.to_owned(),
            serde_json::Value::Object(candidate.auxiliary.clone()),
        );
    }
    let assessment = serde_json::to_value(assessment)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    metadata.insert(META_RISK_ASSESSMENT.to_owned(), assessment);
    metadata.insert(
        META_AFFECTED_TABLES.to_owned(),
        affected_tables(&candidate.sql_text).into(),
    );
    Ok(metadata)
}
