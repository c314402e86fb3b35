//! Prelude module - commonly used types for convenient import.

pub use crate::{
    ManualClock, TestAgent, TestLogStore, init_test_logging, report_workflow, test_context,
};
