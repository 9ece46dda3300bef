//! Test fixtures for databases, candidates and gateways.

use std::io;
use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use sqlgate_approval::{Gateway, PendingOperationStore, Translator};
use sqlgate_core::{CandidateStatement, DatabaseId, DatabaseRegistry, OperationKind};
use sqlgate_storage::{SqliteExecutor, StatementExecutor};
use tempfile::TempDir;

/// Logical databases every fixture registry knows.
pub const TEST_DATABASES: &[&str] = &["hr", "healthcare", "ecommerce", "finance", "education"];

const HR_SEED: &str = "
    CREATE TABLE employees (
        emp_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        department TEXT NOT NULL,
        salary REAL NOT NULL
    );
    INSERT INTO employees VALUES (1, 'Ada Lovelace', 'Sales', 5200.0);
    INSERT INTO employees VALUES (2, 'Grace Hopper', 'Engineering', 7100.0);
    INSERT INTO employees VALUES (3, 'Linus Pauling', 'Sales', 4800.0);
    INSERT INTO employees VALUES (4, 'Barbara Liskov', 'Marketing', 6100.0);
";

const HEALTHCARE_SEED: &str = "
    CREATE TABLE patients (
        patient_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        ward TEXT NOT NULL,
        status TEXT NOT NULL
    );
    INSERT INTO patients VALUES (1, 'Jane Roe', 'Cardiology', 'admitted');
    INSERT INTO patients VALUES (2, 'John Doe', 'Oncology', 'admitted');
    INSERT INTO patients VALUES (3, 'Mary Major', 'Cardiology', 'discharged');
";

const ECOMMERCE_SEED: &str = "
    CREATE TABLE orders (
        order_id INTEGER PRIMARY KEY,
        customer TEXT NOT NULL,
        total REAL NOT NULL
    );
    INSERT INTO orders VALUES (1, 'alice', 42.5);
    INSERT INTO orders VALUES (2, 'bob', 17.0);
";

const FINANCE_SEED: &str = "
    CREATE TABLE accounts (
        account_id INTEGER PRIMARY KEY,
        owner TEXT NOT NULL,
        balance REAL NOT NULL
    );
    INSERT INTO accounts VALUES (1, 'alice', 1200.0);
    INSERT INTO accounts VALUES (2, 'bob', 50.0);
    INSERT INTO accounts VALUES (3, 'carol', 9800.0);
";

const EDUCATION_SEED: &str = "
    CREATE TABLE students (
        student_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        grade INTEGER NOT NULL
    );
    INSERT INTO students VALUES (1, 'Sam', 10);
    INSERT INTO students VALUES (2, 'Kim', 11);
";

/// A registry of [`TEST_DATABASES`] pointing at `<id>.db`. The files do
/// not exist.
#[must_use]
pub fn test_registry() -> DatabaseRegistry {
    TEST_DATABASES
        .iter()
        .fold(DatabaseRegistry::new(), |registry, id| {
            registry.with_database(*id, format!("{id}.db"))
        })
}

/// A database id, unchecked.
#[must_use]
pub fn test_database(id: &str) -> DatabaseId {
    DatabaseId::new_unchecked(id)
}

/// A READ candidate.
#[must_use]
pub fn read_candidate(database: &str, sql: &str) -> CandidateStatement {
    CandidateStatement::new(OperationKind::Read, test_database(database), sql)
}

/// A CREATE candidate.
#[must_use]
pub fn insert_candidate(database: &str, sql: &str) -> CandidateStatement {
    CandidateStatement::new(OperationKind::Create, test_database(database), sql)
}

/// An UPDATE candidate.
#[must_use]
pub fn update_candidate(database: &str, sql: &str) -> CandidateStatement {
    CandidateStatement::new(OperationKind::Update, test_database(database), sql)
}

/// A DELETE candidate.
#[must_use]
pub fn delete_candidate(database: &str, sql: &str) -> CandidateStatement {
    CandidateStatement::new(OperationKind::Delete, test_database(database), sql)
}

/// A gateway over [`test_registry`] with an in-memory pending store.
///
/// # Panics
///
/// Panics if SQLite cannot open an in-memory database.
#[must_use]
pub fn test_gateway(
    executor: impl StatementExecutor + 'static,
    translator: impl Translator + 'static,
) -> Gateway {
    #[allow(clippy::expect_used)]
    let store = PendingOperationStore::in_memory().expect("in-memory pending store");
    Gateway::new(
        Arc::new(test_registry()),
        Arc::new(store),
        Arc::new(executor),
        Arc::new(translator),
    )
}

/// Real SQLite files for every test database, seeded with a few rows, in a
/// temporary directory removed on drop.
#[derive(Debug)]
pub struct SeededDatabases {
    dir: TempDir,
    registry: Arc<DatabaseRegistry>,
}

impl SeededDatabases {
    /// Create and seed the databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any database cannot be created.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let seeds = [
            ("hr", HR_SEED),
            ("healthcare", HEALTHCARE_SEED),
            ("ecommerce", ECOMMERCE_SEED),
            ("finance", FINANCE_SEED),
            ("education", EDUCATION_SEED),
        ];

        let mut registry = DatabaseRegistry::new();
        for (id, seed) in seeds {
            let path = dir.path().join(format!("{id}.db"));
            seed_database(&path, seed)?;
            registry.insert(id, path);
        }

        Ok(Self {
            dir,
            registry: Arc::new(registry),
        })
    }

    /// Directory holding the database files.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Registry mapping each id to its seeded file.
    #[must_use]
    pub fn registry(&self) -> Arc<DatabaseRegistry> {
        Arc::clone(&self.registry)
    }

    /// A SQLite executor over the seeded files.
    #[must_use]
    pub fn executor(&self) -> SqliteExecutor {
        SqliteExecutor::new(self.registry())
    }

    /// Run a scalar query directly against one database, bypassing the
    /// gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unknown or the query fails.
    pub fn scalar(&self, database: &str, sql: &str) -> io::Result<i64> {
        let path = self
            .registry
            .path_of(&test_database(database))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, database.to_owned()))?;
        let conn = Connection::open(path).map_err(io::Error::other)?;
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(io::Error::other)
    }
}

fn seed_database(path: &Path, seed: &str) -> io::Result<()> {
    let conn = Connection::open(path).map_err(io::Error::other)?;
    conn.execute_batch(seed).map_err(io::Error::other)
}
