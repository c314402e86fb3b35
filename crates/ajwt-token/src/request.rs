//! Inputs to minting and verification.

use ajwt_core::{AgentId, InstanceId, StepId, WorkflowId};
use ajwt_delegation::DelegationChain;
use ajwt_pop::{AgentChecksum, PossessionProof, RequestContext};
use ajwt_prompt::PromptChecksum;

/// A request for a token authorizing one workflow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    /// The agent that will execute the step; must be the chain tip.
    pub agent_id: AgentId,
    /// The agent's code checksum as it reports it.
    pub agent_checksum: AgentChecksum,
    /// The chain granting the agent its authority.
    pub chain: DelegationChain,
    /// Workflow to execute.
    pub workflow_id: WorkflowId,
    /// Workflow instance.
    pub instance_id: InstanceId,
    /// Step requested.
    pub step_id: StepId,
    /// Step claimed to have run before, `None` for the entry step.
    pub predecessor: Option<StepId>,
    /// Checksum of the prompt the step will run with.
    pub prompt_checksum: PromptChecksum,
    /// Possession proof over this mint request, with no token bound.
    pub proof: PossessionProof,
    /// The mint request as the issuer observed it.
    pub context: RequestContext,
}

/// The prompt observed when a token is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedPrompt {
    /// Raw prompt content; hashed with the engine's binder.
    Content(String),
    /// A checksum computed by the caller.
    Checksum(PromptChecksum),
}

/// Everything observed alongside a presented token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    /// Possession proof bound to the presented token.
    pub proof: PossessionProof,
    /// The request as the verifier observed it.
    pub context: RequestContext,
    /// The agent's code checksum as it reports it now.
    pub agent_checksum: AgentChecksum,
    /// The prompt the step is about to run with.
    pub prompt: ObservedPrompt,
}
