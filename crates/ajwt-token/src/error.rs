//! Token errors.

use ajwt_core::{AgentId, Categorized, ErrorCategory, TokenId, Timestamp, WorkflowId};
use ajwt_delegation::ChainError;
use ajwt_pop::ProofError;
use ajwt_registry::IdentityError;
use ajwt_storage::StorageError;
use ajwt_workflow::StepError;
use thiserror::Error;

/// Reasons a token cannot be minted or is rejected.
///
/// Every variant is fatal to the request. Nested identity, chain, and step
/// failures keep their own error so the rejection stays specific.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token bytes are not a well-formed A-JWT.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The header names an algorithm or type this issuer does not produce.
    #[error("unsupported token header: {0}")]
    UnsupportedHeader(String),

    /// The header names a key other than the issuer's.
    #[error("token signed by unknown key {kid}")]
    UnknownIssuerKey {
        /// Key id from the header.
        kid: String,
    },

    /// The issuer signature does not verify.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The token was issued by someone else.
    #[error("token issuer {actual:?} is not {expected:?}")]
    WrongIssuer {
        /// This engine's issuer.
        expected: String,
        /// Issuer in the token.
        actual: String,
    },

    /// The token was minted for a different audience.
    #[error("token audience {actual:?} is not {expected:?}")]
    WrongAudience {
        /// The audience this engine serves.
        expected: String,
        /// Audience in the token.
        actual: Option<String>,
    },

    /// The token's lifetime has passed.
    #[error("token {token_id} expired at {expires_at}")]
    Expired {
        /// The token.
        token_id: TokenId,
        /// Its expiry.
        expires_at: Timestamp,
    },

    /// The token was issued in the future.
    #[error("token {token_id} is not valid until {issued_at}")]
    NotYetValid {
        /// The token.
        token_id: TokenId,
        /// Its issue time.
        issued_at: Timestamp,
    },

    /// The token has already been used.
    #[error("token {token_id} already consumed")]
    TokenReplayed {
        /// The token.
        token_id: TokenId,
    },

    /// The prompt differs from the one bound at mint time.
    #[error("prompt for token {token_id} was altered after minting")]
    PromptTampered {
        /// The token.
        token_id: TokenId,
    },

    /// The subject's key or code changed since the token was minted.
    #[error("agent {agent_id} changed since mint: registration version {minted} is now {current}")]
    SubjectChanged {
        /// The subject.
        agent_id: AgentId,
        /// Version recorded in the token.
        minted: u64,
        /// Version now registered.
        current: u64,
    },

    /// The workflow was republished since the token was minted.
    #[error("workflow {workflow_id} changed since mint: version {minted} is now {current}")]
    WorkflowChanged {
        /// The workflow.
        workflow_id: WorkflowId,
        /// Version recorded in the token.
        minted: u64,
        /// Version now in force.
        current: u64,
    },

    /// Subject identity check failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Delegation chain check failed.
    #[error("delegation chain invalid: {0}")]
    ChainInvalid(#[from] ChainError),

    /// Workflow step check failed.
    #[error("workflow step invalid: {0}")]
    StepInvalid(#[from] StepError),

    /// Possession proof check failed.
    #[error("possession proof invalid: {0}")]
    ProofInvalid(#[from] ProofError),

    /// The task settling an accepted token did not run to completion.
    #[error("token commit aborted: {0}")]
    CommitAborted(String),

    /// Consumed-token bookkeeping failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Categorized for TokenError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Identity(e) => e.category(),
            Self::ChainInvalid(e) => e.category(),
            Self::StepInvalid(e) => e.category(),
            Self::Storage(_) | Self::ProofInvalid(ProofError::NonceStore(_)) => {
                ErrorCategory::Storage
            },
            _ => ErrorCategory::Token,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Identity(e) => e.is_retryable(),
            Self::ChainInvalid(e) => e.is_retryable(),
            Self::StepInvalid(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
