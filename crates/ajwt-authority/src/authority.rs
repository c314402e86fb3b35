//! The composed authority.

use std::sync::Arc;

use ajwt_config::Config;
use ajwt_core::{
    AgentId, AppId, InstanceId, ScopeSet, SharedClock, StepId, Timestamp, WorkflowId, system_clock,
};
use ajwt_crypto::{KeyPair, PublicKey};
use ajwt_delegation::{DelegationChain, DelegationEngine};
use ajwt_execlog::{ExecutionLogEntry, ExecutionLogger, LogEntryInput, LogIssue};
use ajwt_pop::{KeyDirectory, ProofVerifier, TimedKeyDirectory};
use ajwt_registry::{Agent, AgentRegistration, AgentRegistry, Rotation};
use ajwt_storage::{KvStore, LogStore, MemoryKvStore, MemoryLogStore, ScopedKvStore};
use ajwt_token::{
    IntentClaims, IntentToken, MintRequest, Presentation, TokenEngine, TokenError,
    VerifiedIntent,
};
use ajwt_workflow::{PublishedWorkflow, WorkflowDefinition, WorkflowRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AuthorityError, AuthorityResult};
use crate::settings;

/// KV namespace binding each workflow instance to its workflow.
pub const INSTANCES_NAMESPACE: &str = "ajwt:instances";

/// Storage the authority runs on.
#[derive(Clone)]
pub struct Backends {
    /// Key-value store for registries, consumed tokens, and anchors.
    pub kv: Arc<dyn KvStore>,
    /// Append-only store for histories and execution logs.
    pub log: Arc<dyn LogStore>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

impl Backends {
    /// Use the given stores.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, log: Arc<dyn LogStore>) -> Self {
        Self { kv, log }
    }

    /// Fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()), Arc::new(MemoryLogStore::new()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceBinding {
    workflow_id: WorkflowId,
    bound_at: Timestamp,
}

/// A token accepted for execution, with the log entry recording it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// The verified token.
    pub intent: VerifiedIntent,
    /// The execution log entry appended for it.
    pub entry: ExecutionLogEntry,
}

/// One issuer's view of the whole protocol.
///
/// Every component shares the injected [`Backends`]; nothing is global.
/// Creating two authorities over the same backends gives two handles onto
/// the same state.
pub struct Authority {
    registry: Arc<AgentRegistry>,
    delegation: Arc<DelegationEngine>,
    workflows: Arc<WorkflowRegistry>,
    tokens: TokenEngine,
    logger: Arc<ExecutionLogger>,
    instances: ScopedKvStore,
    clock: SharedClock,
}

impl std::fmt::Debug for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("issuer", &self.tokens.options().issuer)
            .field("issuer_key", &self.tokens.issuer_key().key_id_hex())
            .finish_non_exhaustive()
    }
}

fn load_issuer_key(config: &Config) -> AuthorityResult<KeyPair> {
    match &config.issuer.key_path {
        Some(path) => KeyPair::load_or_generate(path).map_err(|e| AuthorityError::IssuerKey {
            path: path.clone(),
            reason: e.to_string(),
        }),
        None => {
            warn!("no issuer key path configured, tokens will not survive a restart");
            Ok(KeyPair::generate())
        },
    }
}

impl Authority {
    /// Build an authority from `config` on the system clock.
    ///
    /// The issuer key is read from `issuer.key_path`, and created there if
    /// missing. Without a key path an ephemeral key is generated.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::IssuerKey`] if the key file is unusable, or
    /// [`AuthorityError::Storage`] if the backends reject a namespace.
    pub fn new(config: &Config, backends: Backends) -> AuthorityResult<Self> {
        let issuer = load_issuer_key(config)?;
        Self::with_parts(config, backends, system_clock(), issuer)
    }

    /// Build an authority with an explicit clock and issuer key.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), minus key loading.
    pub fn with_parts(
        config: &Config,
        backends: Backends,
        clock: SharedClock,
        issuer: KeyPair,
    ) -> AuthorityResult<Self> {
        let Backends { kv, log } = backends;

        let registry = Arc::new(
            AgentRegistry::new(Arc::clone(&kv), Arc::clone(&log), Arc::clone(&clock))?
                .with_options(settings::registry_options(config)),
        );
        let directory: Arc<dyn KeyDirectory> = Arc::new(TimedKeyDirectory::new(
            Arc::clone(&registry) as Arc<dyn KeyDirectory>,
            settings::key_lookup_timeout(config),
        ));
        let proofs = Arc::new(
            ProofVerifier::new(directory, Arc::clone(&kv), Arc::clone(&clock))
                .map_err(TokenError::from)?
                .with_max_skew_secs(settings::proof_skew_secs(config)),
        );
        let delegation = Arc::new(
            DelegationEngine::new(Arc::clone(&registry), Arc::clone(&clock))
                .with_max_depth(config.delegation.max_depth),
        );
        let workflows = Arc::new(WorkflowRegistry::new(
            Arc::clone(&kv),
            Arc::clone(&log),
            Arc::clone(&clock),
        )?);
        let tokens = TokenEngine::new(
            issuer,
            Arc::clone(&registry),
            Arc::clone(&delegation),
            Arc::clone(&workflows),
            proofs,
            Arc::clone(&kv),
            Arc::clone(&clock),
            settings::token_options(config),
        )?;
        let logger = Arc::new(ExecutionLogger::new(log, Arc::clone(&kv))?);
        let instances = ScopedKvStore::new(kv, INSTANCES_NAMESPACE)?;

        info!(
            issuer = %config.issuer.name,
            key_id = %tokens.issuer_key().key_id_hex(),
            "authority initialized"
        );
        Ok(Self {
            registry,
            delegation,
            workflows,
            tokens,
            logger,
            instances,
            clock,
        })
    }

    // ---------------------------------------------------------------------
    // Tokens
    // ---------------------------------------------------------------------

    /// Mint a token for the next step of a workflow instance.
    ///
    /// On top of the token engine's checks, the claimed predecessor must be
    /// the last step in the instance's execution log, and the instance must
    /// not already run a different workflow.
    ///
    /// # Errors
    ///
    /// - [`AuthorityError::PredecessorMismatch`] or
    ///   [`AuthorityError::InstanceWorkflowMismatch`].
    /// - [`AuthorityError::Token`] for any token engine rejection.
    /// - [`AuthorityError::Log`] if the execution log cannot be read or is
    ///   tampered.
    pub async fn mint(&self, request: MintRequest) -> AuthorityResult<IntentToken> {
        let instance_id = request.instance_id.clone();
        let workflow_id = request.workflow_id.clone();

        ensure_instance_workflow(&self.instances, &instance_id, &workflow_id).await?;
        logged_tip(&self.logger, &instance_id, request.predecessor.as_ref()).await?;

        let token = self.tokens.mint(request).await?;
        self.bind_instance(&instance_id, &workflow_id).await?;
        Ok(token)
    }

    /// Verify a presented token and record the step in the execution log.
    ///
    /// The token is consumed only if the log append succeeds. Once the
    /// token verifies, consuming it and appending the entry run on their own
    /// task: dropping this future leaves either both done or neither.
    ///
    /// # Errors
    ///
    /// - [`AuthorityError::Token`] for any verification failure, including
    ///   replay.
    /// - [`AuthorityError::PredecessorMismatch`] if another step was logged
    ///   since the token was minted.
    /// - [`AuthorityError::Log`] if the append fails; the token stays
    ///   unconsumed.
    pub async fn accept(
        &self,
        token: &[u8],
        presentation: &Presentation,
    ) -> AuthorityResult<Accepted> {
        let logger = Arc::clone(&self.logger);
        let instances = self.instances.clone();
        let (intent, entry) = self
            .tokens
            .verify_and_commit(token, presentation, move |intent: VerifiedIntent| {
                record_step(logger, instances, intent.claims)
            })
            .await?;
        Ok(Accepted { intent, entry })
    }

    // ---------------------------------------------------------------------
    // Agents
    // ---------------------------------------------------------------------

    /// Register an agent.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Identity`] on rejection.
    pub async fn register(&self, registration: AgentRegistration) -> AuthorityResult<Agent> {
        Ok(self.registry.register(registration).await?)
    }

    /// Register several agents, each independently. Results line up with
    /// `registrations`.
    pub async fn register_batch(
        &self,
        registrations: Vec<AgentRegistration>,
    ) -> Vec<AuthorityResult<Agent>> {
        self.registry
            .register_batch(registrations)
            .await
            .into_iter()
            .map(|result| result.map_err(AuthorityError::from))
            .collect()
    }

    /// Agents registered under `app_id`, sorted by id.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Identity`] on backend failure.
    pub async fn agents_for_app(&self, app_id: &AppId) -> AuthorityResult<Vec<Agent>> {
        Ok(self.registry.list_for_app(app_id).await?)
    }

    /// Activate a pending agent.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Identity`] on rejection.
    pub async fn activate(&self, agent_id: &AgentId) -> AuthorityResult<Agent> {
        Ok(self.registry.activate(agent_id).await?)
    }

    /// Rotate an agent's key, checksum, or scope.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Identity`] on rejection.
    pub async fn rotate(&self, agent_id: &AgentId, rotation: Rotation) -> AuthorityResult<Agent> {
        Ok(self.registry.rotate(agent_id, rotation).await?)
    }

    /// Revoke an agent.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Identity`] on rejection.
    pub async fn revoke(&self, agent_id: &AgentId) -> AuthorityResult<Agent> {
        Ok(self.registry.revoke(agent_id).await?)
    }

    /// Append a delegation from the chain's tip to `to`.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Chain`] on rejection.
    pub async fn delegate(
        &self,
        chain: &DelegationChain,
        from: &AgentId,
        to: &AgentId,
        scope: ScopeSet,
        signer: &KeyPair,
    ) -> AuthorityResult<DelegationChain> {
        Ok(self.delegation.extend(chain, from, to, scope, signer).await?)
    }

    // ---------------------------------------------------------------------
    // Workflows
    // ---------------------------------------------------------------------

    /// Publish a workflow version.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Step`] on rejection.
    pub async fn publish(
        &self,
        definition: WorkflowDefinition,
    ) -> AuthorityResult<WorkflowDefinition> {
        Ok(self.workflows.publish(definition).await?)
    }

    /// Withdraw a workflow.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Step`] on rejection.
    pub async fn withdraw(&self, workflow_id: &WorkflowId) -> AuthorityResult<PublishedWorkflow> {
        Ok(self.workflows.deregister(workflow_id).await?)
    }

    /// The workflow an instance runs, once its first token is minted.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Storage`] on backend failure.
    pub async fn instance_workflow(
        &self,
        instance_id: &InstanceId,
    ) -> AuthorityResult<Option<WorkflowId>> {
        bound_workflow(&self.instances, instance_id).await
    }

    async fn bind_instance(
        &self,
        instance_id: &InstanceId,
        workflow_id: &WorkflowId,
    ) -> AuthorityResult<()> {
        let binding = InstanceBinding {
            workflow_id: workflow_id.clone(),
            bound_at: self.clock.now(),
        };
        if self
            .instances
            .insert_new_json(instance_id.as_str(), &binding)
            .await?
        {
            debug!(instance_id = %instance_id, workflow_id = %workflow_id, "instance bound");
            return Ok(());
        }
        ensure_instance_workflow(&self.instances, instance_id, workflow_id).await
    }

    // ---------------------------------------------------------------------
    // Execution log
    // ---------------------------------------------------------------------

    /// Entries logged for an instance, oldest first.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Log`] if the log cannot be read.
    pub async fn log_entries(
        &self,
        instance_id: &InstanceId,
    ) -> AuthorityResult<Vec<ExecutionLogEntry>> {
        Ok(self.logger.entries(instance_id).await?)
    }

    /// Check an instance's log end to end.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Log`] carrying `TamperedLog` for the first
    /// inconsistency.
    pub async fn verify_log(&self, instance_id: &InstanceId) -> AuthorityResult<()> {
        Ok(self.logger.verify_chain(instance_id).await?)
    }

    /// Every inconsistency in an instance's log.
    ///
    /// # Errors
    ///
    /// [`AuthorityError::Log`] if the log cannot be read.
    pub async fn log_report(&self, instance_id: &InstanceId) -> AuthorityResult<Vec<LogIssue>> {
        Ok(self.logger.verify_report(instance_id).await?)
    }

    // ---------------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------------

    /// The issuer's public key.
    #[must_use]
    pub fn issuer_key(&self) -> PublicKey {
        self.tokens.issuer_key()
    }

    /// The agent registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// The delegation engine.
    #[must_use]
    pub fn delegation(&self) -> &Arc<DelegationEngine> {
        &self.delegation
    }

    /// The workflow registry.
    #[must_use]
    pub fn workflows(&self) -> &Arc<WorkflowRegistry> {
        &self.workflows
    }

    /// The token engine.
    #[must_use]
    pub fn tokens(&self) -> &TokenEngine {
        &self.tokens
    }

    /// The execution logger.
    #[must_use]
    pub fn logger(&self) -> &Arc<ExecutionLogger> {
        &self.logger
    }

    /// The clock every component reads.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

async fn bound_workflow(
    instances: &ScopedKvStore,
    instance_id: &InstanceId,
) -> AuthorityResult<Option<WorkflowId>> {
    Ok(instances
        .get_json::<InstanceBinding>(instance_id.as_str())
        .await?
        .map(|b| b.workflow_id))
}

async fn ensure_instance_workflow(
    instances: &ScopedKvStore,
    instance_id: &InstanceId,
    workflow_id: &WorkflowId,
) -> AuthorityResult<()> {
    match bound_workflow(instances, instance_id).await? {
        Some(bound) if &bound != workflow_id => {
            warn!(
                instance_id = %instance_id,
                bound = %bound,
                requested = %workflow_id,
                "instance bound to another workflow"
            );
            Err(AuthorityError::InstanceWorkflowMismatch {
                instance_id: instance_id.clone(),
                bound,
                requested: workflow_id.clone(),
            })
        },
        _ => Ok(()),
    }
}

/// The instance's last entry, after checking it is `claimed`.
async fn logged_tip(
    logger: &ExecutionLogger,
    instance_id: &InstanceId,
    claimed: Option<&StepId>,
) -> AuthorityResult<Option<ExecutionLogEntry>> {
    let tip = logger.tip(instance_id).await?;
    let logged = tip.as_ref().map(|t| &t.step_id);
    if logged != claimed {
        warn!(
            instance_id = %instance_id,
            logged = ?logged,
            claimed = ?claimed,
            "predecessor does not match execution log"
        );
        return Err(AuthorityError::PredecessorMismatch {
            instance_id: instance_id.clone(),
            logged: logged.cloned(),
            claimed: claimed.cloned(),
        });
    }
    Ok(tip)
}

/// Append the step a verified token authorizes.
///
/// The append names an explicit sequence number, so a step logged
/// concurrently after the tip check surfaces as a sequence gap instead of a
/// second entry.
async fn record_step(
    logger: Arc<ExecutionLogger>,
    instances: ScopedKvStore,
    claims: IntentClaims,
) -> AuthorityResult<ExecutionLogEntry> {
    ensure_instance_workflow(&instances, &claims.instance_id, &claims.workflow_id).await?;
    let tip = logged_tip(&logger, &claims.instance_id, claims.predecessor.as_ref()).await?;
    let sequence_no = tip.map_or(0, |t| t.sequence_no).saturating_add(1);
    Ok(logger
        .append(LogEntryInput {
            instance_id: claims.instance_id,
            sequence_no,
            token_id: claims.token_id,
            step_id: claims.step_id,
        })
        .await?)
}
