//! Test fixtures for protocol values.

use ajwt_core::{AgentId, InstanceId, ScopeSet, StepId, Timestamp, WorkflowId};
use ajwt_crypto::{ContentHash, KeyPair};
use ajwt_pop::{AgentChecksum, PossessionProof, ProofBinding, RequestContext};
use ajwt_registry::AgentRegistration;
use ajwt_workflow::{WorkflowDefinition, WorkflowStep};

/// Prompt used by default in fixtures.
pub const TEST_PROMPT: &str = "Summarize the quarterly report.";

/// An agent id.
///
/// # Panics
///
/// Panics if `s` is not a valid identifier.
#[must_use]
pub fn test_agent_id(s: &str) -> AgentId {
    AgentId::new(s).expect("valid test agent id")
}

/// A step id.
///
/// # Panics
///
/// Panics if `s` is not a valid identifier.
#[must_use]
pub fn test_step(s: &str) -> StepId {
    StepId::new(s).expect("valid test step id")
}

/// A workflow id.
///
/// # Panics
///
/// Panics if `s` is not a valid identifier.
#[must_use]
pub fn test_workflow_id(s: &str) -> WorkflowId {
    WorkflowId::new(s).expect("valid test workflow id")
}

/// An instance id.
///
/// # Panics
///
/// Panics if `s` is not a valid identifier.
#[must_use]
pub fn test_instance(s: &str) -> InstanceId {
    InstanceId::new(s).expect("valid test instance id")
}

/// A scope set.
///
/// # Panics
///
/// Panics if `s` does not parse.
#[must_use]
pub fn test_scope(s: &str) -> ScopeSet {
    ScopeSet::parse(s).expect("valid test scope")
}

/// The checksum of an artifact whose content is `label`.
#[must_use]
pub fn checksum_of(label: &str) -> AgentChecksum {
    AgentChecksum::of_artifact(label.as_bytes())
}

/// A fixed tool call request.
///
/// # Panics
///
/// Never in practice; the literal request is valid.
#[must_use]
pub fn test_context() -> RequestContext {
    RequestContext::new("POST", "https://tools.example/run", b"{}").expect("valid test request")
}

/// Workflow `report`: `start` (needs `read`), then `review`, then `publish`
/// (needs `write`).
#[must_use]
pub fn report_workflow(version: u64) -> WorkflowDefinition {
    WorkflowDefinition::new(test_workflow_id("report"), version)
        .with_step(WorkflowStep::new(test_step("start")).requires(test_scope("read")))
        .with_step(WorkflowStep::new(test_step("review")).after(test_step("start")))
        .with_step(
            WorkflowStep::new(test_step("publish"))
                .after(test_step("review"))
                .requires(test_scope("write")),
        )
}

/// An agent with its own key pair and code checksum.
#[derive(Debug)]
pub struct TestAgent {
    /// The agent's id.
    pub id: AgentId,
    /// The agent's signing key.
    pub key: KeyPair,
    /// The checksum the agent reports.
    pub checksum: AgentChecksum,
}

impl TestAgent {
    /// A fresh agent whose checksum is [`checksum_of`] `"<name>-v1"`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            id: test_agent_id(name),
            key: KeyPair::generate(),
            checksum: checksum_of(&format!("{name}-v1")),
        }
    }

    /// Replace the reported checksum.
    #[must_use]
    pub fn with_checksum(mut self, label: &str) -> Self {
        self.checksum = checksum_of(label);
        self
    }

    /// A registration for this agent.
    #[must_use]
    pub fn registration(&self) -> AgentRegistration {
        AgentRegistration::new(self.id.clone(), self.key.public_key(), self.checksum)
    }

    /// A registration granting `scope`.
    #[must_use]
    pub fn registration_with_scope(&self, scope: &str) -> AgentRegistration {
        self.registration().with_scope(test_scope(scope))
    }

    /// The binding this agent would sign for `context`.
    #[must_use]
    pub fn binding(&self, context: &RequestContext, token_hash: Option<ContentHash>) -> ProofBinding {
        ProofBinding {
            agent_id: self.id.clone(),
            checksum: self.checksum,
            context: context.clone(),
            token_hash,
        }
    }

    /// A proof for a mint request.
    ///
    /// # Panics
    ///
    /// Panics if the proof message cannot be encoded.
    #[must_use]
    pub fn mint_proof(&self, context: &RequestContext, now: Timestamp) -> PossessionProof {
        PossessionProof::create(&self.key, &self.binding(context, None), now)
            .expect("encodable proof")
    }

    /// A proof accompanying a presented token.
    ///
    /// # Panics
    ///
    /// Panics if the proof message cannot be encoded.
    #[must_use]
    pub fn presentation_proof(
        &self,
        context: &RequestContext,
        token_hash: ContentHash,
        now: Timestamp,
    ) -> PossessionProof {
        PossessionProof::create(&self.key, &self.binding(context, Some(token_hash)), now)
            .expect("encodable proof")
    }
}
