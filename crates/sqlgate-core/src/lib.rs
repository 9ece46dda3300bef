//! sqlgate Core - Foundation types for the sqlgate SQL approval gateway.
//!
//! This crate provides:
//! - Operation kinds and risk levels
//! - Logical database identifiers and the configured registry
//! - Candidate statements and SQL normalization
//! - Error types shared across crates

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod database;
pub mod error;
pub mod statement;
pub mod types;

pub use database::{DatabaseDescriptor, DatabaseId, DatabaseRegistry};
pub use error::{CoreError, CoreResult};
pub use statement::{CandidateStatement, Metadata, normalize_sql};
pub use types::{OperationKind, RiskLevel, Timestamp};
