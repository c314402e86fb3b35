//! Workflow errors.

use ajwt_core::{AgentId, Categorized, ErrorCategory, ScopeSet, StepId, WorkflowId};
use ajwt_storage::StorageError;
use thiserror::Error;

/// Errors from publishing workflows and validating steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// No published workflow with this id.
    #[error("unknown workflow: {workflow_id}")]
    UnknownWorkflow {
        /// The workflow id.
        workflow_id: WorkflowId,
    },

    /// The workflow has no such step.
    #[error("workflow {workflow_id} has no step {step_id}")]
    UnknownStep {
        /// The workflow id.
        workflow_id: WorkflowId,
        /// The missing step.
        step_id: StepId,
    },

    /// The claimed predecessor may not lead to this step.
    #[error("step {step_id} is not reachable from {}", .predecessor.as_ref().map_or("the start", StepId::as_str))]
    StepNotReachable {
        /// The target step.
        step_id: StepId,
        /// The claimed predecessor, `None` for a claimed start.
        predecessor: Option<StepId>,
    },

    /// The caller's effective scope does not cover the step's requirement.
    #[error("step {step_id} requires scopes not held: {missing}")]
    InsufficientScope {
        /// The target step.
        step_id: StepId,
        /// Required scopes the caller lacks.
        missing: ScopeSet,
    },

    /// The agent is not assigned to this step.
    #[error("agent {agent_id} may not perform step {step_id}")]
    AgentNotAllowed {
        /// The target step.
        step_id: StepId,
        /// The rejected agent.
        agent_id: AgentId,
    },

    /// The steps do not form a DAG with exactly one entry step.
    #[error("invalid workflow graph for {workflow_id}: {reason}")]
    InvalidGraph {
        /// The workflow id.
        workflow_id: WorkflowId,
        /// What is wrong with the graph.
        reason: String,
    },

    /// The proposed version does not replace the current one.
    #[error("workflow {workflow_id} version {proposed} does not supersede version {current}")]
    VersionConflict {
        /// The workflow id.
        workflow_id: WorkflowId,
        /// The latest published version.
        current: u64,
        /// The rejected version.
        proposed: u64,
    },

    /// Persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Categorized for StepError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            _ => ErrorCategory::Step,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }
}

/// Result type for workflow operations.
pub type StepResult<T> = Result<T, StepError>;
