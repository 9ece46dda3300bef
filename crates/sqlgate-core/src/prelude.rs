//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sqlgate_core::prelude::*;` to import all essential types.

pub use crate::{CoreError, CoreResult};

pub use crate::{DatabaseDescriptor, DatabaseId, DatabaseRegistry};

pub use crate::{CandidateStatement, Metadata, normalize_sql};

pub use crate::{OperationKind, RiskLevel, Timestamp};
