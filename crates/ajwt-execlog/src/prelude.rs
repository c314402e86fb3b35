//! Prelude module - commonly used types for convenient import.

pub use crate::{ExecutionLogEntry, ExecutionLogger, LogEntryInput, LogError, LogIssue, LogResult};
