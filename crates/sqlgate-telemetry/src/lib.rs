//! sqlgate Telemetry - Logging and request tracing.
//!
//! This crate provides:
//! - Logging setup with several output formats and targets
//! - Request context that correlates log lines for one gateway call
//!
//! # Example
//!
//! ```rust,no_run
//! use sqlgate_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! let config = LogConfig::new("debug").with_format(LogFormat::Compact);
//! setup_logging(&config).unwrap();
//!
//! let ctx = RequestContext::new("cli").with_operation("submit");
//! let _entered = ctx.span().entered();
//! tracing::info!("submitting statement");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
