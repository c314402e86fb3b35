//! Key lookup and possession proof errors.

use ajwt_core::AgentId;
use ajwt_storage::StorageError;
use thiserror::Error;

/// Failure to resolve an agent's current public key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyLookupError {
    /// No key is registered for the agent.
    #[error("no key registered for agent {agent_id}")]
    NotFound {
        /// The agent that was looked up.
        agent_id: AgentId,
    },

    /// The directory did not answer in time.
    #[error("key lookup for agent {agent_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The agent that was looked up.
        agent_id: AgentId,
        /// The applied timeout.
        timeout_ms: u64,
    },

    /// The directory backend failed.
    #[error("key directory unavailable: {0}")]
    Unavailable(String),
}

/// Result type for key lookups.
pub type KeyLookupResult<T> = Result<T, KeyLookupError>;

/// Reasons a possession proof is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// The signer's key could not be resolved.
    #[error(transparent)]
    KeyLookup(#[from] KeyLookupError),

    /// The proof was made for a different agent.
    #[error("proof is for agent {actual}, expected {expected}")]
    WrongAgent {
        /// Agent the verifier expected.
        expected: AgentId,
        /// Agent named in the proof.
        actual: AgentId,
    },

    /// The proof is bound to a different token, or to none when one was
    /// required.
    #[error("proof is not bound to the presented token")]
    TokenBindingMismatch,

    /// The signature does not cover the observed request with the agent's
    /// current key.
    #[error("proof signature does not match the observed request")]
    InvalidSignature,

    /// The proof timestamp is outside the accepted window.
    #[error("proof timestamp is {age_secs}s from now, allowed skew is {max_skew_secs}s")]
    OutsideWindow {
        /// Signed distance from the verifier's clock (positive is in the past).
        age_secs: i64,
        /// The accepted window.
        max_skew_secs: i64,
    },

    /// The nonce was already used.
    #[error("proof nonce already used")]
    NonceReplayed,

    /// The nonce is malformed.
    #[error("invalid proof nonce: {0}")]
    InvalidNonce(String),

    /// The request context could not be built.
    #[error("invalid request context: {0}")]
    InvalidContext(String),

    /// The proof message could not be encoded.
    #[error("proof encoding failed: {0}")]
    Encoding(String),

    /// The spent-nonce store failed.
    #[error("nonce store unavailable: {0}")]
    NonceStore(#[from] StorageError),
}

/// Result type for possession proofs.
pub type ProofResult<T> = Result<T, ProofError>;
