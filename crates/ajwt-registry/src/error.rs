//! Identity error types.

use ajwt_core::{AgentId, AgentStatus, Categorized, ErrorCategory};
use ajwt_pop::AgentChecksum;
use ajwt_storage::StorageError;
use thiserror::Error;

/// Errors from agent registration and identity checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// An agent with this id is already registered.
    #[error("agent already registered: {agent_id}")]
    DuplicateAgent {
        /// The conflicting agent id.
        agent_id: AgentId,
    },

    /// No agent with this id exists.
    #[error("unknown agent: {agent_id}")]
    UnknownAgent {
        /// The missing agent id.
        agent_id: AgentId,
    },

    /// The agent has been revoked.
    #[error("agent revoked: {agent_id}")]
    RevokedAgent {
        /// The revoked agent id.
        agent_id: AgentId,
    },

    /// The agent exists but may not act in its current status.
    #[error("agent {agent_id} is {status}, not active")]
    AgentNotActive {
        /// The agent id.
        agent_id: AgentId,
        /// Its current status.
        status: AgentStatus,
    },

    /// The presented code checksum is not the registered one.
    #[error("checksum mismatch for agent {agent_id}")]
    ChecksumMismatch {
        /// The agent id.
        agent_id: AgentId,
    },

    /// Another live agent is registered with the same code checksum.
    #[error("checksum {checksum} already bound to agent {existing}")]
    ChecksumCollision {
        /// The contested checksum.
        checksum: AgentChecksum,
        /// The agent that holds it.
        existing: AgentId,
    },

    /// A rotation that changes nothing.
    #[error("rotation for agent {agent_id} changes nothing")]
    NoChange {
        /// The agent id.
        agent_id: AgentId,
    },

    /// The requested status transition is not allowed.
    #[error("agent {agent_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The agent id.
        agent_id: AgentId,
        /// Current status.
        from: AgentStatus,
        /// Requested status.
        to: AgentStatus,
    },

    /// Persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Categorized for IdentityError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            _ => ErrorCategory::Identity,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
