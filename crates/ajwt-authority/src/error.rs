//! Authority errors.

use ajwt_core::{Categorized, ErrorCategory, InstanceId, StepId, WorkflowId};
use ajwt_delegation::ChainError;
use ajwt_execlog::LogError;
use ajwt_registry::IdentityError;
use ajwt_storage::StorageError;
use ajwt_token::TokenError;
use ajwt_workflow::StepError;
use thiserror::Error;

/// Errors from the composed protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The claimed predecessor is not the last step logged for the instance.
    #[error(
        "predecessor mismatch for {instance_id}: last logged step is {logged:?}, claimed {claimed:?}"
    )]
    PredecessorMismatch {
        /// The workflow instance.
        instance_id: InstanceId,
        /// Last step in the execution log, `None` for an empty log.
        logged: Option<StepId>,
        /// Predecessor named by the request or token.
        claimed: Option<StepId>,
    },

    /// The instance already runs a different workflow.
    #[error("instance {instance_id} is bound to workflow {bound}, not {requested}")]
    InstanceWorkflowMismatch {
        /// The workflow instance.
        instance_id: InstanceId,
        /// Workflow the instance was first minted for.
        bound: WorkflowId,
        /// Workflow named now.
        requested: WorkflowId,
    },

    /// The issuer key could not be loaded.
    #[error("issuer key {path}: {reason}")]
    IssuerKey {
        /// Configured key path.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// Agent registry rejection.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Delegation chain rejection.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Workflow rejection.
    #[error(transparent)]
    Step(#[from] StepError),

    /// Token rejection.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Execution log rejection.
    #[error(transparent)]
    Log(#[from] LogError),

    /// Persistence failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Categorized for AuthorityError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::PredecessorMismatch { .. } | Self::InstanceWorkflowMismatch { .. } => {
                ErrorCategory::Step
            },
            Self::IssuerKey { .. } => ErrorCategory::Token,
            Self::Identity(e) => e.category(),
            Self::Chain(e) => e.category(),
            Self::Step(e) => e.category(),
            Self::Token(e) => e.category(),
            Self::Log(e) => e.category(),
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }
}

/// Result type for authority operations.
pub type AuthorityResult<T> = Result<T, AuthorityError>;
