//! SQLite-backed [`StatementExecutor`].
//!
//! Each call opens its own connection on a blocking worker thread. Database
//! files are never created implicitly: a missing file is a connection error.
//! Queries and table listings open read-only; only `execute` may write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use sqlgate_core::{DatabaseId, DatabaseRegistry};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::executor::{Row, StatementExecutor, TableSummary};

/// Executes statements against the SQLite files named in a
/// [`DatabaseRegistry`].
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    registry: Arc<DatabaseRegistry>,
}

impl SqliteExecutor {
    /// Create an executor over the given registry.
    #[must_use]
    pub fn new(registry: Arc<DatabaseRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this executor resolves databases against.
    #[must_use]
    pub fn registry(&self) -> &DatabaseRegistry {
        &self.registry
    }

    /// List the user tables of a database with their row counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unknown or cannot be read.
    pub async fn describe(&self, database: &DatabaseId) -> StorageResult<Vec<TableSummary>> {
        let path = self.path_for(database)?;
        let name = database.to_string();
        run_blocking(move || {
            let conn = open(&name, &path, READ_ONLY)?;
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let tables = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            tables
                .into_iter()
                .map(|table| -> StorageResult<TableSummary> {
                    let count: i64 = conn.query_row(
                        &format!("SELECT COUNT(*) FROM {}", quote_ident(&table)),
                        [],
                        |row| row.get(0),
                    )?;
                    Ok(TableSummary {
                        name: table,
                        row_count: u64::try_from(count).unwrap_or(0),
                    })
                })
                .collect()
        })
        .await
    }

    fn path_for(&self, database: &DatabaseId) -> StorageResult<PathBuf> {
        self.registry
            .path_of(database)
            .map(Path::to_path_buf)
            .ok_or_else(|| StorageError::UnknownDatabase(database.to_string()))
    }
}

#[async_trait]
impl StatementExecutor for SqliteExecutor {
    async fn query(&self, database: &DatabaseId, sql: &str) -> StorageResult<Vec<Row>> {
        let path = self.path_for(database)?;
        let name = database.to_string();
        let sql = sql.to_owned();
        debug!(database = %name, "running query");

        run_blocking(move || {
            let conn = open(&name, &path, READ_ONLY)?;
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Row::new();
                for (index, column) in columns.iter().enumerate() {
                    record.insert(column.clone(), to_json(row.get_ref(index)?));
                }
                out.push(record);
            }
            Ok(out)
        })
        .await
    }

    async fn execute(&self, database: &DatabaseId, sql: &str) -> StorageResult<u64> {
        let path = self.path_for(database)?;
        let name = database.to_string();
        let sql = sql.to_owned();
        debug!(database = %name, "executing statement");

        run_blocking(move || {
            let conn = open(&name, &path, READ_WRITE)?;
            let changed = conn.execute(&sql, [])?;
            Ok(u64::try_from(changed).unwrap_or(u64::MAX))
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StorageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Internal(e.to_string()))?
}

const READ_ONLY: OpenFlags =
    OpenFlags::SQLITE_OPEN_READ_ONLY.union(OpenFlags::SQLITE_OPEN_NO_MUTEX);
const READ_WRITE: OpenFlags =
    OpenFlags::SQLITE_OPEN_READ_WRITE.union(OpenFlags::SQLITE_OPEN_NO_MUTEX);

fn open(database: &str, path: &Path, flags: OpenFlags) -> StorageResult<Connection> {
    Connection::open_with_flags(path, flags).map_err(|e| StorageError::Connection {
        database: database.to_owned(),
        message: e.to_string(),
    })
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
    }
}
