//! Delegation chain errors.

use ajwt_core::{AgentId, Categorized, ErrorCategory, ScopeSet};
use ajwt_registry::IdentityError;
use ajwt_storage::StorageError;
use thiserror::Error;

/// Errors from extending or verifying a delegation chain.
///
/// Every variant invalidates the whole chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// An agent on the chain is unregistered, pending, or revoked.
    #[error("agent {agent_id} cannot take part in delegation: {reason}")]
    AgentNotActive {
        /// The agent that failed the check.
        agent_id: AgentId,
        /// The registry's verdict.
        #[source]
        reason: IdentityError,
    },

    /// A link grants scopes its signer does not hold.
    #[error("agent {agent_id} cannot delegate scopes it does not hold: {missing}")]
    ScopeEscalation {
        /// The delegating agent.
        agent_id: AgentId,
        /// Scopes requested beyond the signer's held scope.
        missing: ScopeSet,
    },

    /// A link's parent hash does not match its predecessor.
    #[error("link {index} does not hash-link to its predecessor")]
    BrokenLink {
        /// Position of the bad link, root link is 0.
        index: usize,
    },

    /// A link's signature does not verify under the signer's current key.
    #[error("link {index} has an invalid signature")]
    InvalidSignature {
        /// Position of the bad link.
        index: usize,
    },

    /// A link is not signed by the agent the previous link delegated to.
    #[error("link {index} is signed by {actual}, expected {expected}")]
    Discontinuous {
        /// Position of the bad link.
        index: usize,
        /// The agent that should have signed.
        expected: AgentId,
        /// The agent named as signer.
        actual: AgentId,
    },

    /// Only the current tip of a chain may extend it.
    #[error("chain tip is {tip}, not {from}")]
    NotTip {
        /// The chain's current tip.
        tip: AgentId,
        /// The agent that tried to extend it.
        from: AgentId,
    },

    /// The key signing a new link is not the delegator's registered key.
    #[error("signing key is not the registered key of {agent_id}")]
    WrongSigner {
        /// The delegating agent.
        agent_id: AgentId,
    },

    /// The chain is longer than allowed.
    #[error("chain depth {depth} exceeds maximum {max}")]
    TooDeep {
        /// Number of links.
        depth: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Registry lookup failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ChainError {
    /// Map a registry failure for `agent_id` into a chain error.
    pub(crate) fn from_identity(agent_id: &AgentId, err: IdentityError) -> Self {
        match err {
            IdentityError::Storage(e) => Self::Storage(e),
            reason => Self::AgentNotActive {
                agent_id: agent_id.clone(),
                reason,
            },
        }
    }
}

impl Categorized for ChainError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            _ => ErrorCategory::Chain,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }
}

/// Result type for delegation operations.
pub type ChainResult<T> = Result<T, ChainError>;
