//! Convenient re-exports for telemetry users.
//!
//! ```rust
//! use sqlgate_telemetry::prelude::*;
//! ```

pub use crate::{
    LogConfig, LogFormat, LogTarget, RequestContext, TelemetryError, TelemetryResult,
    setup_logging,
};
