//! Test doubles for the gateway's collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlgate_approval::{ClassificationFailure, FailureKind, TranslationRequest, Translator};
use sqlgate_core::{CandidateStatement, DatabaseId};
use sqlgate_storage::{Row, StatementExecutor, StorageError, StorageResult};

/// Translator that answers from a fixed table keyed by request text.
///
/// Unknown texts produce an `UnparseableOutput` failure. Every request is
/// captured for later inspection.
#[derive(Debug, Clone, Default)]
pub struct StubTranslator {
    responses: Arc<Mutex<HashMap<String, Result<CandidateStatement, ClassificationFailure>>>>,
    requests: Arc<Mutex<Vec<TranslationRequest>>>,
}

impl StubTranslator {
    /// Create a translator with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `text` with `candidate`.
    #[must_use]
    pub fn with_response(self, text: impl Into<String>, candidate: CandidateStatement) -> Self {
        if let Ok(mut guard) = self.responses.lock() {
            guard.insert(text.into(), Ok(candidate));
        }
        self
    }

    /// Answer `text` with a failure.
    #[must_use]
    pub fn with_failure(self, text: impl Into<String>, failure: ClassificationFailure) -> Self {
        if let Ok(mut guard) = self.responses.lock() {
            guard.insert(text.into(), Err(failure));
        }
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<CandidateStatement, ClassificationFailure> {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|r| r.get(&request.text).cloned())
            .unwrap_or_else(|| {
                Err(ClassificationFailure::new(
                    FailureKind::UnparseableOutput,
                    format!("no stub response for '{}'", request.text),
                ))
            })
    }
}

/// Executor that counts calls.
///
/// Without an inner executor it returns canned rows and a canned affected
/// count. With one, it forwards every call after counting it.
#[derive(Clone)]
pub struct CountingExecutor {
    inner: Option<Arc<dyn StatementExecutor>>,
    queries: Arc<AtomicUsize>,
    executions: Arc<AtomicUsize>,
    executed_sql: Arc<Mutex<Vec<String>>>,
    rows: Vec<Row>,
    affected: u64,
    delay: Option<Duration>,
}

impl std::fmt::Debug for CountingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingExecutor")
            .field("queries", &self.query_count())
            .field("executions", &self.execute_count())
            .finish_non_exhaustive()
    }
}

impl Default for CountingExecutor {
    fn default() -> Self {
        Self {
            inner: None,
            queries: Arc::new(AtomicUsize::new(0)),
            executions: Arc::new(AtomicUsize::new(0)),
            executed_sql: Arc::new(Mutex::new(Vec::new())),
            rows: Vec::new(),
            affected: 1,
            delay: None,
        }
    }
}

impl CountingExecutor {
    /// Create a standalone executor returning no rows and one affected row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count calls and forward them to `inner`.
    #[must_use]
    pub fn wrapping(inner: Arc<dyn StatementExecutor>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::default()
        }
    }

    /// Rows returned by standalone queries.
    #[must_use]
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Affected count returned by standalone executions.
    #[must_use]
    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// Sleep before every execution, widening race windows.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `query` calls.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of `execute` calls.
    #[must_use]
    pub fn execute_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Statements passed to `execute`, in call order.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed_sql
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StatementExecutor for CountingExecutor {
    async fn query(&self, database: &DatabaseId, sql: &str) -> StorageResult<Vec<Row>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match &self.inner {
            Some(inner) => inner.query(database, sql).await,
            None => Ok(self.rows.clone()),
        }
    }

    async fn execute(&self, database: &DatabaseId, sql: &str) -> StorageResult<u64> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.executed_sql.lock() {
            guard.push(sql.to_owned());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.inner {
            Some(inner) => inner.execute(database, sql).await,
            None => Ok(self.affected),
        }
    }
}

/// Executor whose every call fails with the same storage error.
#[derive(Debug, Clone)]
pub struct FailingExecutor {
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingExecutor {
    /// Fail every call with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StorageResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Statement(self.message.clone()))
    }
}

#[async_trait]
impl StatementExecutor for FailingExecutor {
    async fn query(&self, _database: &DatabaseId, _sql: &str) -> StorageResult<Vec<Row>> {
        self.fail()
    }

    async fn execute(&self, _database: &DatabaseId, _sql: &str) -> StorageResult<u64> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::OperationKind;

    fn request(text: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_owned(),
            database: DatabaseId::new_unchecked("hr"),
            recent_turns: Vec::new(),
            has_back_reference: false,
        }
    }

    #[tokio::test]
    async fn test_stub_translator() {
        let candidate = CandidateStatement::new(
            OperationKind::Read,
            DatabaseId::new_unchecked("hr"),
            "SELECT 1",
        );
        let translator = StubTranslator::new().with_response("one", candidate.clone());

        assert_eq!(translator.translate(&request("one")).await.unwrap(), candidate);
        let failure = translator.translate(&request("two")).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::UnparseableOutput);
        assert_eq!(translator.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_counting_executor() {
        let executor = CountingExecutor::new().with_affected(3);
        let db = DatabaseId::new_unchecked("hr");

        assert_eq!(executor.execute(&db, "DELETE FROM t WHERE id = 1;").await.unwrap(), 3);
        assert!(executor.query(&db, "SELECT 1;").await.unwrap().is_empty());
        assert_eq!(executor.execute_count(), 1);
        assert_eq!(executor.query_count(), 1);
        assert_eq!(executor.executed_sql(), vec!["DELETE FROM t WHERE id = 1;"]);
    }

    #[tokio::test]
    async fn test_failing_executor() {
        let executor = FailingExecutor::new("disk I/O error");
        let err = executor
            .execute(&DatabaseId::new_unchecked("hr"), "UPDATE t SET a = 1 WHERE id = 1;")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "disk I/O error");
        assert_eq!(executor.call_count(), 1);
    }
}
