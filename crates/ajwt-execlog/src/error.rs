//! Execution log errors.

use ajwt_core::{Categorized, ErrorCategory, InstanceId};
use ajwt_storage::StorageError;
use thiserror::Error;

/// Errors from appending to or verifying an execution log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The entry's sequence number is not exactly one past the tip.
    #[error("sequence gap in {instance_id}: expected {expected}, got {actual}")]
    SequenceGap {
        /// The workflow instance.
        instance_id: InstanceId,
        /// The only acceptable sequence number.
        expected: u64,
        /// The sequence number presented.
        actual: u64,
    },

    /// Stored entries do not hash-chain.
    #[error("tampered log for {instance_id} at entry {sequence_no}: {reason}")]
    TamperedLog {
        /// The workflow instance.
        instance_id: InstanceId,
        /// First entry found inconsistent.
        sequence_no: u64,
        /// What did not match.
        reason: String,
    },

    /// Persistence failed. Appends are never retried.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Categorized for LogError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            _ => ErrorCategory::Log,
        }
    }
}

/// Result type for execution log operations.
pub type LogResult<T> = Result<T, LogError>;
