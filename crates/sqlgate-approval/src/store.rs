//! Durable store of pending operations.
//!
//! One SQLite table, one connection behind a mutex. Rows are never deleted:
//! the table doubles as the audit trail of every mutation ever queued.
//!
//! Two layers keep a decision from executing twice:
//!
//! - [`PendingOperationStore::claim`] writes a claim token on the row in an
//!   immediate transaction before anything executes. Every handle on the
//!   same file, in this process or another, sees the claim and waits until
//!   the holder completes or releases it. Only the holder can move the row
//!   out of PENDING.
//! - [`PendingOperationStore::lock_decision`] hands out a per-id async lock
//!   so deciders inside one process queue up instead of polling the row.
//!
//! A claim older than [`CLAIM_TTL`] is treated as abandoned and can be
//! taken over.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use sqlgate_core::{DatabaseId, Metadata, OperationKind, Timestamp};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::pending::{OperationId, PendingOperation, PendingStatus};

/// Highest schema version this build understands.
pub const SCHEMA_VERSION: i64 = 3;

/// Age after which a decision claim counts as abandoned.
pub const CLAIM_TTL: Duration = Duration::from_secs(300);

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CLAIM_WAIT: Duration = Duration::from_secs(30);
const CLAIM_POLL: Duration = Duration::from_millis(20);

const SELECT_COLUMNS: &str = "SELECT id, target_database, operation_type, sql_query, metadata, \
                              status, created_at, decided_at, executed_sql, claimed_at \
                              FROM pending_operations";

type LockMap = DashMap<OperationId, Arc<tokio::sync::Mutex<()>>>;

/// Outcome of [`PendingOperationStore::set_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The operation moved out of PENDING.
    Applied,
    /// The operation was already decided; nothing changed.
    AlreadyFinal(PendingStatus),
}

/// Exclusive, durable right to decide one operation.
///
/// Consumed by [`PendingOperationStore::complete`] or
/// [`PendingOperationStore::release`]. Dropping it without either leaves the
/// row blocked until the claim expires.
#[derive(Debug)]
#[must_use = "an unfinished claim blocks other deciders until it expires"]
pub struct DecisionClaim {
    id: OperationId,
    token: String,
}

impl DecisionClaim {
    /// The claimed operation.
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }
}

/// Outcome of claiming an operation for a decision.
#[derive(Debug)]
pub enum Claim {
    /// The caller owns the decision; the operation is PENDING.
    Acquired(DecisionClaim, PendingOperation),
    /// The operation was already decided.
    Decided(PendingOperation),
}

/// In-process decision lock, see [`PendingOperationStore::lock_decision`].
///
/// Dropping it frees the lock and forgets the id once nobody else waits on it.
pub struct DecisionLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    id: OperationId,
    locks: &'a LockMap,
}

impl std::fmt::Debug for DecisionLock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionLock").field("id", &self.id).finish()
    }
}

impl Drop for DecisionLock<'_> {
    fn drop(&mut self) {
        // The guard holds a reference to the mutex; release it before counting.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// SQLite-backed pending operation store.
pub struct PendingOperationStore {
    conn: Mutex<Connection>,
    decision_locks: LockMap,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for PendingOperationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOperationStore")
            .field("path", &self.path)
            .field("decision_locks", &self.decision_locks.len())
            .finish_non_exhaustive()
    }
}

impl PendingOperationStore {
    /// Open (or create) a file-backed store, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the file cannot
    /// be opened, or the schema is newer than this build.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "opened pending operation store");
        Ok(store)
    }

    /// Create an in-memory store. Contents are lost on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        init_connection(&conn)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            decision_locks: DashMap::new(),
            path,
        })
    }

    /// Backing file, or `None` for an in-memory store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist a new PENDING operation and return its id.
    ///
    /// Id assignment and insertion happen in one immediate transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be encoded or the insert fails.
    pub fn create(
        &self,
        database: &DatabaseId,
        kind: OperationKind,
        sql: &str,
        metadata: &Metadata,
    ) -> StoreResult<OperationId> {
        let metadata =
            serde_json::to_string(metadata).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let created_at = Timestamp::now().0.to_rfc3339();

        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO pending_operations \
             (target_database, operation_type, sql_query, metadata, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                database.as_str(),
                kind.as_str(),
                sql,
                metadata,
                PendingStatus::Pending.as_str(),
                created_at,
            ],
        )?;
        let id = OperationId(tx.last_insert_rowid());
        tx.commit()?;

        info!(%id, database = %database, operation = %kind, "queued pending operation");
        Ok(id)
    }

    /// Fetch one operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub fn get(&self, id: OperationId) -> StoreResult<Option<PendingOperation>> {
        let conn = self.lock_conn();
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id.0],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    /// All operations ordered by id, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or any row cannot be decoded.
    pub fn list(&self, status: Option<PendingStatus>) -> StoreResult<Vec<PendingOperation>> {
        let conn = self.lock_conn();
        let raws = match status {
            Some(status) => {
                let mut stmt =
                    conn.prepare(&format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY id ASC"))?;
                let raws = stmt
                    .query_map([status.as_str()], RawRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                raws
            },
            None => {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
                let raws = stmt
                    .query_map([], RawRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                raws
            },
        };
        drop(conn);
        raws.into_iter().map(RawRow::decode).collect()
    }

    /// Number of operations, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self, status: Option<PendingStatus>) -> StoreResult<u64> {
        let conn = self.lock_conn();
        let count: i64 = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM pending_operations WHERE status = ?1",
                [status.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM pending_operations", [], |row| {
                row.get(0)
            })?,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Move a PENDING operation to a terminal status in one step.
    ///
    /// Claims the row and completes the claim immediately. If the operation
    /// is already terminal nothing is written and the current status is
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] for a transition to
    /// PENDING, [`StoreError::NotFound`] for an unknown id,
    /// [`StoreError::Claimed`] while another decider holds the row, or a
    /// database error.
    pub fn set_status(
        &self,
        id: OperationId,
        status: PendingStatus,
        executed_sql: Option<&str>,
    ) -> StoreResult<Transition> {
        if !status.is_terminal() {
            return Err(StoreError::InvalidTransition);
        }
        match self.try_claim(id)? {
            None => Err(StoreError::Claimed(id)),
            Some(Claim::Decided(operation)) => {
                debug!(%id, status = %operation.status, "operation already decided");
                Ok(Transition::AlreadyFinal(operation.status))
            },
            Some(Claim::Acquired(claim, _)) => self.complete(claim, status, executed_sql),
        }
    }

    /// Claim an operation for a decision without waiting.
    ///
    /// Returns `None` while another decider holds a live claim.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id or a database
    /// error.
    pub fn try_claim(&self, id: OperationId) -> StoreResult<Option<Claim>> {
        let now = Utc::now();
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = tx
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id.0],
                RawRow::from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))?;
        let claimed_at = raw.claimed_at.clone();
        let operation = raw.decode()?;

        if operation.status.is_terminal() {
            return Ok(Some(Claim::Decided(operation)));
        }

        if let Some(claimed_at) = claimed_at {
            let since = parse_timestamp(&claimed_at)
                .map_err(|message| StoreError::Corrupt { id, message })?;
            let expired = now
                .signed_duration_since(since.0)
                .to_std()
                .is_ok_and(|age| age >= CLAIM_TTL);
            if !expired {
                debug!(%id, claimed_at = %since, "operation claimed by another decider");
                return Ok(None);
            }
            warn!(%id, claimed_at = %since, "taking over abandoned decision claim");
        }

        let token = Uuid::new_v4().to_string();
        tx.execute(
            "UPDATE pending_operations SET claim_token = ?1, claimed_at = ?2 WHERE id = ?3",
            params![token, now.to_rfc3339(), id.0],
        )?;
        tx.commit()?;

        debug!(%id, "decision claim acquired");
        Ok(Some(Claim::Acquired(DecisionClaim { id, token }, operation)))
    }

    /// Claim an operation for a decision, waiting while another decider
    /// holds it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Claimed`] if the claim is still held after the
    /// wait, [`StoreError::NotFound`] for an unknown id, or a database
    /// error.
    pub async fn claim(&self, id: OperationId) -> StoreResult<Claim> {
        let poll = async {
            loop {
                match self.try_claim(id) {
                    Ok(Some(claim)) => return Ok(claim),
                    Ok(None) => tokio::time::sleep(CLAIM_POLL).await,
                    Err(e) => return Err(e),
                }
            }
        };

        tokio::time::timeout(CLAIM_WAIT, poll)
            .await
            .unwrap_or_else(|_| {
                warn!(%id, wait_secs = CLAIM_WAIT.as_secs(), "gave up waiting for decision claim");
                Err(StoreError::Claimed(id))
            })
    }

    /// Record the decision for a claimed operation and drop the claim.
    ///
    /// `executed_sql` is the statement actually run for an approval.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] for a transition to
    /// PENDING, [`StoreError::ClaimLost`] if the claim was taken over, or a
    /// database error.
    pub fn complete(
        &self,
        claim: DecisionClaim,
        status: PendingStatus,
        executed_sql: Option<&str>,
    ) -> StoreResult<Transition> {
        if !status.is_terminal() {
            self.release(claim)?;
            return Err(StoreError::InvalidTransition);
        }

        let DecisionClaim { id, token } = claim;
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE pending_operations \
             SET status = ?1, decided_at = ?2, executed_sql = ?3, \
                 claim_token = NULL, claimed_at = NULL \
             WHERE id = ?4 AND status = 'PENDING' AND claim_token = ?5",
            params![
                status.as_str(),
                Timestamp::now().0.to_rfc3339(),
                executed_sql,
                id.0,
                token,
            ],
        )?;

        if changed == 0 {
            let current: String = tx
                .query_row(
                    "SELECT status FROM pending_operations WHERE id = ?1",
                    [id.0],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound(id))?;
            let current: PendingStatus = current
                .parse()
                .map_err(|message| StoreError::Corrupt { id, message })?;
            if current.is_terminal() {
                return Ok(Transition::AlreadyFinal(current));
            }
            warn!(%id, "decision claim was taken over before completion");
            return Err(StoreError::ClaimLost(id));
        }
        tx.commit()?;

        info!(%id, %status, "pending operation decided");
        Ok(Transition::Applied)
    }

    /// Give a claim back without deciding; the operation stays PENDING.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub fn release(&self, claim: DecisionClaim) -> StoreResult<()> {
        let DecisionClaim { id, token } = claim;
        self.lock_conn().execute(
            "UPDATE pending_operations SET claim_token = NULL, claimed_at = NULL \
             WHERE id = ?1 AND claim_token = ?2",
            params![id.0, token],
        )?;
        debug!(%id, "decision claim released");
        Ok(())
    }

    /// Acquire the in-process decision lock for one id.
    ///
    /// Held by the gateway around claim, execute and completion. Released
    /// when the returned lock drops.
    pub async fn lock_decision(&self, id: OperationId) -> DecisionLock<'_> {
        let lock = self
            .decision_locks
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        DecisionLock {
            guard: Some(lock.lock_owned().await),
            id,
            locks: &self.decision_locks,
        }
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| {
            warn!("pending store connection lock was poisoned, recovering");
            e.into_inner()
        })
    }
}

fn init_connection(conn: &Connection) -> StoreResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // In-memory databases report "memory" and keep their journal mode.
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "pending store connection ready");
    Ok(())
}

fn schema_version(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn migrate(conn: &Connection) -> StoreResult<()> {
    let mut current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    if current < 1 {
        conn.execute_batch(include_str!("../migrations/0001_pending_operations.sql"))?;
        conn.pragma_update(None, "user_version", 1)?;
        current = 1;
    }

    if current < 2 {
        conn.execute_batch(include_str!("../migrations/0002_decision_audit.sql"))?;
        conn.pragma_update(None, "user_version", 2)?;
        current = 2;
    }

    if current < 3 {
        conn.execute_batch(include_str!("../migrations/0003_decision_claims.sql"))?;
        conn.pragma_update(None, "user_version", 3)?;
        debug!("migrated pending store to schema 3");
    }

    Ok(())
}

/// Undecoded column values of one row.
struct RawRow {
    id: i64,
    target_database: String,
    operation_type: String,
    sql_query: String,
    metadata: String,
    status: String,
    created_at: String,
    decided_at: Option<String>,
    executed_sql: Option<String>,
    claimed_at: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            target_database: row.get(1)?,
            operation_type: row.get(2)?,
            sql_query: row.get(3)?,
            metadata: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            decided_at: row.get(7)?,
            executed_sql: row.get(8)?,
            claimed_at: row.get(9)?,
        })
    }

    fn decode(self) -> StoreResult<PendingOperation> {
        let id = OperationId(self.id);
        let corrupt = |message: String| StoreError::Corrupt { id, message };

        let operation_kind: OperationKind =
            self.operation_type.parse().map_err(|e| corrupt(format!("{e}")))?;
        let status: PendingStatus = self.status.parse().map_err(corrupt)?;
        let metadata: Metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| corrupt(format!("metadata: {e}")))?;
        let created_at = parse_timestamp(&self.created_at).map_err(corrupt)?;
        let decided_at = self
            .decided_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(corrupt)?;

        Ok(PendingOperation {
            id,
            target_database: DatabaseId::new_unchecked(self.target_database),
            operation_kind,
            sql_text: self.sql_query,
            metadata,
            status,
            created_at,
            decided_at,
            executed_sql: self.executed_sql,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<Timestamp, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Timestamp(dt.with_timezone(&Utc)))
        .map_err(|e| format!("timestamp '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hr() -> DatabaseId {
        DatabaseId::new_unchecked("hr")
    }

    fn queue_update(store: &PendingOperationStore) -> OperationId {
        let mut metadata = Metadata::new();
        metadata.insert("natural_language".to_owned(), serde_json::json!("raise"));
        store
            .create(
                &hr(),
                OperationKind::Update,
                "UPDATE employees SET salary = 1 WHERE emp_id = 1;",
                &metadata,
            )
            .unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);

        let op = store.get(id).unwrap().unwrap();
        assert_eq!(op.id, id);
        assert_eq!(op.status, PendingStatus::Pending);
        assert_eq!(op.operation_kind, OperationKind::Update);
        assert_eq!(op.target_database, hr());
        assert_eq!(op.natural_language(), Some("raise"));
        assert!(op.decided_at.is_none());
        assert!(store.get(OperationId(99)).unwrap().is_none());
    }

    #[test]
    fn test_ids_are_dense_and_increasing() {
        let store = PendingOperationStore::in_memory().unwrap();
        let ids: Vec<_> = (0..5).map(|_| queue_update(&store)).collect();
        assert_eq!(ids, (1..=5).map(OperationId).collect::<Vec<_>>());
    }

    #[test]
    fn test_set_status_is_idempotent() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);

        assert_eq!(
            store.set_status(id, PendingStatus::Approved, None).unwrap(),
            Transition::Applied
        );
        assert_eq!(
            store.set_status(id, PendingStatus::Rejected, None).unwrap(),
            Transition::AlreadyFinal(PendingStatus::Approved)
        );
        assert_eq!(
            store.set_status(id, PendingStatus::Approved, None).unwrap(),
            Transition::AlreadyFinal(PendingStatus::Approved)
        );

        let op = store.get(id).unwrap().unwrap();
        assert_eq!(op.status, PendingStatus::Approved);
        assert!(op.decided_at.is_some());
    }

    #[test]
    fn test_set_status_records_executed_sql() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);
        let replacement = "UPDATE employees SET salary = 2 WHERE emp_id = 1;";

        store
            .set_status(id, PendingStatus::Approved, Some(replacement))
            .unwrap();
        let op = store.get(id).unwrap().unwrap();
        assert_eq!(op.executed_sql.as_deref(), Some(replacement));
        assert_eq!(
            op.sql_text,
            "UPDATE employees SET salary = 1 WHERE emp_id = 1;"
        );
    }

    #[test]
    fn test_cannot_transition_to_pending() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);
        assert!(matches!(
            store.set_status(id, PendingStatus::Pending, None),
            Err(StoreError::InvalidTransition)
        ));
    }

    #[test]
    fn test_set_status_unknown_id() {
        let store = PendingOperationStore::in_memory().unwrap();
        assert!(matches!(
            store.set_status(OperationId(7), PendingStatus::Rejected, None),
            Err(StoreError::NotFound(OperationId(7)))
        ));
    }

    #[test]
    fn test_list_and_count_filter_by_status() {
        let store = PendingOperationStore::in_memory().unwrap();
        let a = queue_update(&store);
        let b = queue_update(&store);
        let c = queue_update(&store);
        store.set_status(b, PendingStatus::Rejected, None).unwrap();

        let pending: Vec<_> = store
            .list(Some(PendingStatus::Pending))
            .unwrap()
            .into_iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(pending, vec![a, c]);
        assert_eq!(store.list(None).unwrap().len(), 3);
        assert_eq!(store.count(Some(PendingStatus::Rejected)).unwrap(), 1);
        assert_eq!(store.count(None).unwrap(), 3);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pending.db");

        let id = {
            let store = PendingOperationStore::open(&path).unwrap();
            let id = queue_update(&store);
            store.set_status(id, PendingStatus::Rejected, None).unwrap();
            id
        };

        let store = PendingOperationStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let op = store.get(id).unwrap().unwrap();
        assert_eq!(op.status, PendingStatus::Rejected);

        let next = queue_update(&store);
        assert_eq!(next, OperationId(2));
    }

    #[test]
    fn test_rejects_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 99).unwrap();
        }

        let err = PendingOperationStore::open(&path).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedSchemaVersion {
                found: 99,
                supported: SCHEMA_VERSION
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_decision_lock_serializes_same_id() {
        let store = Arc::new(PendingOperationStore::in_memory().unwrap());
        let id = queue_update(&store);
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = store.lock_decision(id).await;
                let now = inside.fetch_add(1, Ordering::SeqCst).saturating_add(1);
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(store.decision_locks.len(), 0);
    }

    #[tokio::test]
    async fn test_decision_lock_entry_survives_while_waited_on() {
        let store = Arc::new(PendingOperationStore::in_memory().unwrap());
        let first = store.lock_decision(OperationId(1)).await;

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let _lock = store.lock_decision(OperationId(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(store.decision_locks.len(), 1);
        waiter.await.unwrap();
        assert_eq!(store.decision_locks.len(), 0);
    }

    #[tokio::test]
    async fn test_decision_locks_are_per_id() {
        let store = PendingOperationStore::in_memory().unwrap();
        let _first = store.lock_decision(OperationId(1)).await;
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            store.lock_decision(OperationId(2)),
        )
        .await;
        assert!(second.is_ok());
    }

    fn acquired(claim: Option<Claim>) -> (DecisionClaim, PendingOperation) {
        match claim {
            Some(Claim::Acquired(claim, operation)) => (claim, operation),
            other => panic!("expected an acquired claim, got {other:?}"),
        }
    }

    #[test]
    fn test_claim_is_exclusive_until_released() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);

        let (claim, operation) = acquired(store.try_claim(id).unwrap());
        assert_eq!(claim.id(), id);
        assert_eq!(operation.status, PendingStatus::Pending);
        assert!(store.try_claim(id).unwrap().is_none());
        assert!(matches!(
            store.set_status(id, PendingStatus::Rejected, None),
            Err(StoreError::Claimed(claimed)) if claimed == id
        ));

        store.release(claim).unwrap();
        let (claim, _) = acquired(store.try_claim(id).unwrap());
        assert_eq!(
            store.complete(claim, PendingStatus::Rejected, None).unwrap(),
            Transition::Applied
        );
        assert!(matches!(
            store.try_claim(id).unwrap(),
            Some(Claim::Decided(op)) if op.status == PendingStatus::Rejected
        ));
    }

    #[test]
    fn test_complete_records_statement_and_clears_claim() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);
        let sql = "UPDATE employees SET salary = 1 WHERE emp_id = 1;";

        let (claim, _) = acquired(store.try_claim(id).unwrap());
        store.complete(claim, PendingStatus::Approved, Some(sql)).unwrap();

        let op = store.get(id).unwrap().unwrap();
        assert_eq!(op.status, PendingStatus::Approved);
        assert_eq!(op.executed_sql.as_deref(), Some(sql));
        let claimed_at: Option<String> = store
            .lock_conn()
            .query_row(
                "SELECT claimed_at FROM pending_operations WHERE id = ?1",
                [id.0],
                |row| row.get(0),
            )
            .unwrap();
        assert!(claimed_at.is_none());
    }

    #[test]
    fn test_completing_to_pending_releases_the_claim() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);

        let (claim, _) = acquired(store.try_claim(id).unwrap());
        assert!(matches!(
            store.complete(claim, PendingStatus::Pending, None),
            Err(StoreError::InvalidTransition)
        ));
        assert!(store.try_claim(id).unwrap().is_some());
    }

    #[test]
    fn test_abandoned_claim_is_taken_over() {
        let store = PendingOperationStore::in_memory().unwrap();
        let id = queue_update(&store);

        let (stale, _) = acquired(store.try_claim(id).unwrap());
        store
            .lock_conn()
            .execute(
                "UPDATE pending_operations SET claimed_at = '2000-01-01T00:00:00+00:00' \
                 WHERE id = ?1",
                [id.0],
            )
            .unwrap();

        let (fresh, _) = acquired(store.try_claim(id).unwrap());
        let late = store.complete(
            stale,
            PendingStatus::Approved,
            Some("UPDATE employees SET salary = 9;"),
        );
        assert!(matches!(late, Err(StoreError::ClaimLost(lost)) if lost == id));
        assert_eq!(
            store.complete(fresh, PendingStatus::Rejected, None).unwrap(),
            Transition::Applied
        );
        let op = store.get(id).unwrap().unwrap();
        assert_eq!(op.status, PendingStatus::Rejected);
        assert!(op.executed_sql.is_none());
    }

    #[test]
    fn test_claim_is_visible_to_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.db");
        let first = PendingOperationStore::open(&path).unwrap();
        let second = PendingOperationStore::open(&path).unwrap();
        let id = queue_update(&first);

        let (claim, _) = acquired(first.try_claim(id).unwrap());
        assert!(second.try_claim(id).unwrap().is_none());

        first.release(claim).unwrap();
        assert!(second.try_claim(id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_claim_waits_for_other_handle_to_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.db");
        let first = Arc::new(PendingOperationStore::open(&path).unwrap());
        let second = PendingOperationStore::open(&path).unwrap();
        let id = queue_update(&first);

        let (claim, _) = acquired(first.try_claim(id).unwrap());
        let holder = {
            let first = Arc::clone(&first);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                first.complete(claim, PendingStatus::Rejected, None).unwrap()
            })
        };

        let waited = second.claim(id).await.unwrap();
        assert_eq!(holder.await.unwrap(), Transition::Applied);
        assert!(matches!(
            waited,
            Claim::Decided(op) if op.status == PendingStatus::Rejected
        ));
    }

    #[tokio::test]
    async fn test_claim_unknown_id() {
        let store = PendingOperationStore::in_memory().unwrap();
        assert!(matches!(
            store.claim(OperationId(3)).await,
            Err(StoreError::NotFound(OperationId(3)))
        ));
    }

    #[test]
    fn test_schema_upgrade_from_version_two() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(include_str!("../migrations/0001_pending_operations.sql"))
                .unwrap();
            conn.execute_batch(include_str!("../migrations/0002_decision_audit.sql"))
                .unwrap();
            conn.pragma_update(None, "user_version", 2).unwrap();
        }

        let store = PendingOperationStore::open(&path).unwrap();
        let id = queue_update(&store);
        assert!(store.try_claim(id).unwrap().is_some());
        let version = schema_version(&store.lock_conn()).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
