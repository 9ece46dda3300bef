//! sqlgate Test - Shared test utilities for the sqlgate crates.
//!
//! Doubles for the gateway's collaborators and fixtures for the usual
//! databases, meant to be pulled in as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! sqlgate-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use sqlgate_test::{CountingExecutor, StubTranslator, test_gateway, read_candidate};
//!
//! #[tokio::test]
//! async fn test_read_runs_once() {
//!     let executor = CountingExecutor::new();
//!     let translator = StubTranslator::new()
//!         .with_response("everyone", read_candidate("hr", "SELECT * FROM employees"));
//!     let gateway = test_gateway(executor.clone(), translator);
//!
//!     gateway.submit("everyone", "hr").await.unwrap();
//!     assert_eq!(executor.query_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
