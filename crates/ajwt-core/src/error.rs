//! Core error types and the cross-crate error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while constructing core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An identifier is empty, too long, or contains forbidden characters.
    #[error("invalid {kind} identifier {value:?}: {reason}")]
    InvalidIdentifier {
        /// Identifier kind (`agent`, `workflow`, ...).
        kind: &'static str,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A scope string is malformed.
    #[error("invalid scope {0:?}")]
    InvalidScope(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The category every protocol rejection belongs to.
///
/// All categories fail closed. Only [`ErrorCategory::Storage`] errors can be
/// retryable, and only for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Agent registration and checksum binding.
    Identity,
    /// Delegation chain integrity.
    Chain,
    /// Workflow step validation.
    Step,
    /// Token minting and verification.
    Token,
    /// Execution log integrity.
    Log,
    /// Persistence backend failures.
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::Chain => "chain",
            Self::Step => "step",
            Self::Token => "token",
            Self::Log => "log",
            Self::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// Implemented by every protocol error so callers can branch on category.
pub trait Categorized {
    /// The taxonomy category of this error.
    fn category(&self) -> ErrorCategory;

    /// Whether the failed operation may be retried unchanged.
    fn is_retryable(&self) -> bool {
        false
    }
}
