//! Prelude module - commonly used test utilities.
//!
//! Use `use sqlgate_test::prelude::*;` in test modules.

pub use crate::{CountingExecutor, FailingExecutor, StubTranslator};

pub use crate::{
    SeededDatabases, delete_candidate, insert_candidate, read_candidate, test_database,
    test_gateway, test_registry, update_candidate,
};

pub use crate::init_test_logging;
