//! sqlgate Storage - statement execution against logical databases.
//!
//! The gateway only ever talks to a [`StatementExecutor`]. This crate
//! defines that contract and ships [`SqliteExecutor`], which maps each
//! logical database in a [`DatabaseRegistry`](sqlgate_core::DatabaseRegistry)
//! to a SQLite file.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod executor;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use executor::{Row, StatementExecutor, TableSummary};
pub use sqlite::SqliteExecutor;
