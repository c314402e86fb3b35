use ajwt_core::{AgentId, ScopeSet, StepId};
use tracing::warn;

use crate::definition::{WorkflowDefinition, WorkflowStep};
use crate::error::{StepError, StepResult};

impl WorkflowDefinition {
    /// Check that `step_id` may run next, given the caller's effective scope
    /// and the step that ran before it (`None` when starting the workflow).
    ///
    /// # Errors
    ///
    /// - [`StepError::UnknownStep`] if the step does not exist.
    /// - [`StepError::StepNotReachable`] if `claimed_predecessor` is not an
    ///   allowed predecessor, including a claimed start of a non-entry step.
    /// - [`StepError::InsufficientScope`] if `chain_scope` lacks part of the
    ///   step's required scope.
    pub fn validate_step(
        &self,
        step_id: &StepId,
        chain_scope: &ScopeSet,
        claimed_predecessor: Option<&StepId>,
    ) -> StepResult<&WorkflowStep> {
        let step = self.step(step_id).ok_or_else(|| StepError::UnknownStep {
            workflow_id: self.workflow_id.clone(),
            step_id: step_id.clone(),
        })?;

        let reachable = match claimed_predecessor {
            None => step.is_entry(),
            Some(pred) => step.allowed_predecessors.contains(pred),
        };
        if !reachable {
            warn!(
                workflow_id = %self.workflow_id,
                step_id = %step_id,
                predecessor = ?claimed_predecessor.map(StepId::as_str),
                "workflow step bypass attempt"
            );
            return Err(StepError::StepNotReachable {
                step_id: step_id.clone(),
                predecessor: claimed_predecessor.cloned(),
            });
        }

        if !step.required_scope.is_subset_of(chain_scope) {
            return Err(StepError::InsufficientScope {
                step_id: step_id.clone(),
                missing: step.required_scope.missing_from(chain_scope),
            });
        }
        Ok(step)
    }

    /// Check that `agent_id` is assigned to `step_id`.
    ///
    /// # Errors
    ///
    /// [`StepError::UnknownStep`] or [`StepError::AgentNotAllowed`].
    pub fn authorize_agent(&self, step_id: &StepId, agent_id: &AgentId) -> StepResult<()> {
        let step = self.step(step_id).ok_or_else(|| StepError::UnknownStep {
            workflow_id: self.workflow_id.clone(),
            step_id: step_id.clone(),
        })?;
        if step.allows_agent(agent_id) {
            Ok(())
        } else {
            Err(StepError::AgentNotAllowed {
                step_id: step_id.clone(),
                agent_id: agent_id.clone(),
            })
        }
    }
}
