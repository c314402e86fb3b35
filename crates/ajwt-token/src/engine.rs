//! Token minting and live verification.

use std::future::Future;
use std::sync::Arc;

use ajwt_core::{SharedClock, TokenId};
use ajwt_crypto::{ContentHash, KeyPair, PublicKey};
use ajwt_delegation::{ChainError, DelegationEngine, VerifiedChain};
use ajwt_pop::{ProofBinding, ProofError, ProofVerifier};
use ajwt_prompt::PromptBinder;
use ajwt_registry::{Agent, AgentRegistry};
use ajwt_storage::KvStore;
use ajwt_workflow::{ValidatedStep, WorkflowRegistry};
use tracing::{debug, error, info, warn};

use crate::claims::{Confirmation, IntentClaims, IntentToken};
use crate::consumed::{ConsumedMark, ConsumedTokenStore};
use crate::error::{TokenError, TokenResult};
use crate::request::{MintRequest, ObservedPrompt, Presentation};
use crate::wire;

/// Default token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 300;

/// Default clock leeway for `iat`/`exp` checks in seconds.
pub const DEFAULT_LEEWAY_SECS: i64 = 30;

/// Issuer policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOptions {
    /// Value of the `iss` claim; tokens naming another issuer are rejected.
    pub issuer: String,
    /// Value of the `aud` claim. When set, verification requires it.
    pub audience: Option<String>,
    /// Token lifetime.
    pub ttl_secs: i64,
    /// Tolerated clock difference when checking `iat` and `exp`.
    pub leeway_secs: i64,
    /// Normalize prompt whitespace before hashing observed prompt content.
    pub normalize_prompts: bool,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            issuer: "ajwt".to_string(),
            audience: None,
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            leeway_secs: DEFAULT_LEEWAY_SECS,
            normalize_prompts: false,
        }
    }
}

/// A token that passed every live check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIntent {
    /// The token's claims.
    pub claims: IntentClaims,
    /// The delegation chain as verified now.
    pub chain: VerifiedChain,
    /// The step as validated against the workflow now in force.
    pub step: ValidatedStep,
    /// The subject's current registration.
    pub subject: Agent,
    /// Hash of the presented token.
    pub token_hash: ContentHash,
}

impl VerifiedIntent {
    /// The subject's current public key.
    #[must_use]
    pub fn subject_key(&self) -> PublicKey {
        self.subject.public_key
    }
}

/// Mints and verifies intent tokens.
///
/// Verification never trusts anything cached from mint time: the subject,
/// every agent on the delegation chain, and the workflow are re-read from
/// their registries on each call.
pub struct TokenEngine {
    issuer: KeyPair,
    issuer_key: PublicKey,
    registry: Arc<AgentRegistry>,
    delegation: Arc<DelegationEngine>,
    workflows: Arc<WorkflowRegistry>,
    proofs: Arc<ProofVerifier>,
    consumed: Arc<ConsumedTokenStore>,
    clock: SharedClock,
    binder: PromptBinder,
    options: TokenOptions,
}

impl TokenEngine {
    /// Create an engine signing with `issuer`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Storage`] if the consumed-token store cannot be
    /// opened over `kv`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        issuer: KeyPair,
        registry: Arc<AgentRegistry>,
        delegation: Arc<DelegationEngine>,
        workflows: Arc<WorkflowRegistry>,
        proofs: Arc<ProofVerifier>,
        kv: Arc<dyn KvStore>,
        clock: SharedClock,
        options: TokenOptions,
    ) -> TokenResult<Self> {
        Ok(Self {
            issuer_key: issuer.public_key(),
            issuer,
            registry,
            delegation,
            workflows,
            proofs,
            consumed: Arc::new(ConsumedTokenStore::new(kv)?),
            clock,
            binder: PromptBinder::new(options.normalize_prompts),
            options,
        })
    }

    /// The issuer's public key.
    #[must_use]
    pub fn issuer_key(&self) -> PublicKey {
        self.issuer_key
    }

    /// The issuer policy.
    #[must_use]
    pub fn options(&self) -> &TokenOptions {
        &self.options
    }

    /// The binder used for observed prompt content.
    #[must_use]
    pub fn prompt_binder(&self) -> PromptBinder {
        self.binder
    }

    /// The consumed-token store.
    #[must_use]
    pub fn consumed(&self) -> &ConsumedTokenStore {
        &self.consumed
    }

    /// Mint a token for one workflow step.
    ///
    /// Checks, in order: the agent is the chain tip and runs its registered
    /// code, the chain verifies, the step is reachable from the claimed
    /// predecessor within the chain's scope and assigned to the agent, and
    /// the possession proof covers this request.
    ///
    /// # Errors
    ///
    /// - [`TokenError::ChainInvalid`] for a chain that does not end at the
    ///   agent or does not verify.
    /// - [`TokenError::Identity`] for an unknown, inactive, or stale agent.
    /// - [`TokenError::StepInvalid`] for a step that may not run next.
    /// - [`TokenError::ProofInvalid`] for a bad possession proof.
    pub async fn mint(&self, request: MintRequest) -> TokenResult<IntentToken> {
        if request.chain.tip() != &request.agent_id {
            return Err(ChainError::NotTip {
                tip: request.chain.tip().clone(),
                from: request.agent_id.clone(),
            }
            .into());
        }
        let agent = self
            .registry
            .require_checksum(&request.agent_id, &request.agent_checksum)
            .await?;
        let chain = self.delegation.verify(&request.chain).await?;

        let definition = self.workflows.current(&request.workflow_id).await?;
        let step = definition
            .validate_step(
                &request.step_id,
                &chain.effective_scope,
                request.predecessor.as_ref(),
            )?
            .clone();
        definition.authorize_agent(&request.step_id, &request.agent_id)?;

        let binding = ProofBinding {
            agent_id: request.agent_id.clone(),
            checksum: request.agent_checksum,
            context: request.context.clone(),
            token_hash: None,
        };
        let proven = self.proofs.verify(&request.proof, &binding).await?;
        if proven != agent.public_key {
            warn!(agent_id = %agent.agent_id, "mint proof verified under a stale key");
            return Err(ProofError::InvalidSignature.into());
        }

        let now = self.clock.now();
        let claims = IntentClaims {
            token_id: TokenId::new(),
            issuer: self.options.issuer.clone(),
            audience: self.options.audience.clone(),
            subject_agent_id: agent.agent_id.clone(),
            issued_at: now,
            expires_at: now.plus_secs(self.options.ttl_secs),
            cnf: Confirmation {
                kid: agent.public_key.key_id_hex(),
            },
            agent_checksum: agent.code_checksum,
            registration_version: agent.registration_version,
            delegation_chain: request.chain,
            workflow_id: request.workflow_id,
            workflow_version: definition.version,
            instance_id: request.instance_id,
            step_id: request.step_id,
            predecessor: request.predecessor,
            scope: step.required_scope,
            prompt_checksum: request.prompt_checksum,
            proof_of_possession: request.proof,
        };
        let token = wire::encode(&self.issuer, claims)?;

        info!(
            token_id = %token.token_id(),
            agent_id = %agent.agent_id,
            workflow_id = %token.claims().workflow_id,
            step_id = %token.claims().step_id,
            "intent token minted"
        );
        Ok(token)
    }

    /// Verify and consume a token.
    ///
    /// # Errors
    ///
    /// Any [`TokenError`]; see [`verify_and_commit`](Self::verify_and_commit).
    pub async fn verify(
        &self,
        bytes: &[u8],
        presentation: &Presentation,
    ) -> TokenResult<VerifiedIntent> {
        let (verified, ()) = self
            .verify_and_commit(bytes, presentation, |_| async { Ok::<(), TokenError>(()) })
            .await?;
        Ok(verified)
    }

    /// Verify a token, run `commit`, and consume the token only if `commit`
    /// succeeds.
    ///
    /// Work on one token id is serialized, and the consumed mark is created
    /// with an atomic insert before `commit` runs, so at most one caller ever
    /// reaches `commit` for a given token. If `commit` fails the mark is
    /// removed again. The presentation proof's nonce stays spent either way;
    /// a retry needs a fresh proof.
    ///
    /// Reserving the mark, running `commit`, and releasing the mark on
    /// failure happen on one spawned task that keeps the token's lock. Once
    /// verification passes, dropping the returned future no longer matters:
    /// the task settles the token either way. A task that panics leaves the
    /// mark in place.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`], [`TokenError::UnsupportedHeader`],
    ///   [`TokenError::UnknownIssuerKey`], or [`TokenError::InvalidSignature`]
    ///   for a token this issuer did not produce.
    /// - [`TokenError::TokenReplayed`] for a consumed token.
    /// - [`TokenError::Expired`], [`TokenError::NotYetValid`],
    ///   [`TokenError::WrongIssuer`], or [`TokenError::WrongAudience`].
    /// - [`TokenError::Identity`] or [`TokenError::SubjectChanged`] if the
    ///   subject is no longer active with the same key and code.
    /// - [`TokenError::ChainInvalid`] if the chain no longer verifies.
    /// - [`TokenError::WorkflowChanged`] or [`TokenError::StepInvalid`] if
    ///   the workflow moved on.
    /// - [`TokenError::PromptTampered`] for a different prompt.
    /// - [`TokenError::ProofInvalid`] for a bad presentation proof.
    /// - [`TokenError::CommitAborted`] if the commit task panicked.
    /// - Whatever `commit` returns.
    pub async fn verify_and_commit<F, Fut, T, E>(
        &self,
        bytes: &[u8],
        presentation: &Presentation,
        commit: F,
    ) -> Result<(VerifiedIntent, T), E>
    where
        F: FnOnce(VerifiedIntent) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TokenError> + Send + 'static,
    {
        let token = wire::decode(bytes, &self.issuer_key)?;
        let token_id = token.token_id();

        self.ensure_unconsumed(&token).await?;
        let guard = self.consumed.lock(&token_id).await;
        self.ensure_unconsumed(&token).await?;

        let verified = self.check(&token, presentation).await?;

        let mark = ConsumedMark {
            token_id,
            subject: verified.subject.agent_id.clone(),
            consumed_at: self.clock.now(),
        };
        let consumed = Arc::clone(&self.consumed);
        let settled = tokio::spawn(async move {
            let _guard = guard;
            settle(&consumed, &mark, verified, commit).await
        });
        match settled.await {
            Ok(result) => result,
            Err(e) => {
                error!(token_id = %token_id, error = %e, "commit task aborted, token left consumed");
                Err(TokenError::CommitAborted(e.to_string()).into())
            },
        }
    }

    /// Decode a token without checking its signature or any live state.
    ///
    /// # Errors
    ///
    /// [`TokenError::Malformed`] or [`TokenError::UnsupportedHeader`].
    pub fn inspect(bytes: &[u8]) -> TokenResult<IntentToken> {
        wire::decode_unverified(bytes)
    }

    async fn ensure_unconsumed(&self, token: &IntentToken) -> TokenResult<()> {
        let token_id = token.token_id();
        if self.consumed.is_consumed(&token_id).await? {
            warn!(
                token_id = %token_id,
                agent_id = %token.claims().subject_agent_id,
                "token replay rejected"
            );
            return Err(TokenError::TokenReplayed { token_id });
        }
        Ok(())
    }

    async fn check(
        &self,
        token: &IntentToken,
        presentation: &Presentation,
    ) -> TokenResult<VerifiedIntent> {
        let claims = token.claims();
        self.check_envelope(claims)?;

        let subject = self
            .registry
            .require_checksum(&claims.subject_agent_id, &presentation.agent_checksum)
            .await?;
        if subject.registration_version != claims.registration_version
            || subject.public_key.key_id_hex() != claims.cnf.kid
        {
            warn!(
                agent_id = %subject.agent_id,
                minted = claims.registration_version,
                current = subject.registration_version,
                "token subject changed since mint"
            );
            return Err(TokenError::SubjectChanged {
                agent_id: subject.agent_id,
                minted: claims.registration_version,
                current: subject.registration_version,
            });
        }

        let chain = self.delegation.verify(&claims.delegation_chain).await?;
        if chain.tip.agent_id != claims.subject_agent_id {
            return Err(ChainError::NotTip {
                tip: chain.tip.agent_id,
                from: claims.subject_agent_id.clone(),
            }
            .into());
        }

        let definition = self.workflows.current(&claims.workflow_id).await?;
        if definition.version != claims.workflow_version {
            warn!(
                workflow_id = %claims.workflow_id,
                minted = claims.workflow_version,
                current = definition.version,
                "token workflow changed since mint"
            );
            return Err(TokenError::WorkflowChanged {
                workflow_id: claims.workflow_id.clone(),
                minted: claims.workflow_version,
                current: definition.version,
            });
        }
        let step = definition
            .validate_step(
                &claims.step_id,
                &chain.effective_scope,
                claims.predecessor.as_ref(),
            )?
            .clone();
        definition.authorize_agent(&claims.step_id, &claims.subject_agent_id)?;

        let prompt_ok = match &presentation.prompt {
            ObservedPrompt::Content(content) => self.binder.verify(content, &claims.prompt_checksum),
            ObservedPrompt::Checksum(observed) => {
                self.binder.verify_checksum(observed, &claims.prompt_checksum)
            },
        };
        if !prompt_ok {
            warn!(
                token_id = %claims.token_id,
                agent_id = %claims.subject_agent_id,
                "prompt tampered since mint"
            );
            return Err(TokenError::PromptTampered {
                token_id: claims.token_id,
            });
        }

        // Last: a successful proof check spends the nonce.
        let token_hash = token.hash();
        let binding = ProofBinding {
            agent_id: claims.subject_agent_id.clone(),
            checksum: presentation.agent_checksum,
            context: presentation.context.clone(),
            token_hash: Some(token_hash),
        };
        let proven = self.proofs.verify(&presentation.proof, &binding).await?;
        if proven != subject.public_key {
            return Err(ProofError::InvalidSignature.into());
        }

        debug!(token_id = %claims.token_id, "intent token verified");
        Ok(VerifiedIntent {
            claims: claims.clone(),
            chain,
            step: ValidatedStep {
                workflow_id: definition.workflow_id.clone(),
                workflow_version: definition.version,
                step,
            },
            subject,
            token_hash,
        })
    }

    fn check_envelope(&self, claims: &IntentClaims) -> TokenResult<()> {
        if claims.issuer != self.options.issuer {
            return Err(TokenError::WrongIssuer {
                expected: self.options.issuer.clone(),
                actual: claims.issuer.clone(),
            });
        }
        if let Some(expected) = &self.options.audience
            && claims.audience.as_ref() != Some(expected)
        {
            return Err(TokenError::WrongAudience {
                expected: expected.clone(),
                actual: claims.audience.clone(),
            });
        }

        let now = self.clock.now();
        if now.seconds_since(&claims.expires_at) >= self.options.leeway_secs {
            warn!(token_id = %claims.token_id, expires_at = %claims.expires_at, "expired token rejected");
            return Err(TokenError::Expired {
                token_id: claims.token_id,
                expires_at: claims.expires_at,
            });
        }
        if claims.issued_at.seconds_since(&now) > self.options.leeway_secs {
            return Err(TokenError::NotYetValid {
                token_id: claims.token_id,
                issued_at: claims.issued_at,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEngine")
            .field("issuer_key", &self.issuer_key.key_id_hex())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Reserve `mark`, run `commit`, and release the mark if `commit` fails.
async fn settle<F, Fut, T, E>(
    consumed: &ConsumedTokenStore,
    mark: &ConsumedMark,
    verified: VerifiedIntent,
    commit: F,
) -> Result<(VerifiedIntent, T), E>
where
    F: FnOnce(VerifiedIntent) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<TokenError>,
{
    let token_id = mark.token_id;
    if !consumed.reserve(mark).await.map_err(TokenError::from)? {
        warn!(token_id = %token_id, "token consumed concurrently");
        return Err(TokenError::TokenReplayed { token_id }.into());
    }

    match commit(verified.clone()).await {
        Ok(value) => {
            info!(
                token_id = %token_id,
                agent_id = %verified.subject.agent_id,
                step_id = %verified.claims.step_id,
                "intent token accepted"
            );
            Ok((verified, value))
        },
        Err(e) => {
            if let Err(undo) = consumed.release(&token_id).await {
                warn!(token_id = %token_id, error = %undo, "failed to release consumed mark");
            }
            debug!(token_id = %token_id, "commit failed, token left unconsumed");
            Err(e)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ajwt_core::{AgentId, Clock, InstanceId, ScopeSet, StepId, WorkflowId};
    use ajwt_delegation::DelegationChain;
    use ajwt_pop::{AgentChecksum, PossessionProof, RequestContext};
    use ajwt_registry::{AgentRegistration, IdentityError, Rotation};
    use ajwt_storage::{MemoryKvStore, MemoryLogStore};
    use ajwt_workflow::{StepError, WorkflowDefinition, WorkflowStep};
    use ajwt_test::ManualClock;

    const PROMPT: &str = "Summarize the quarterly report.";

    struct Fixture {
        clock: Arc<ManualClock>,
        registry: Arc<AgentRegistry>,
        workflows: Arc<WorkflowRegistry>,
        engine: TokenEngine,
        worker_key: KeyPair,
        chain: DelegationChain,
    }

    fn id(s: &str) -> AgentId {
        AgentId::new(s).unwrap()
    }

    fn step(s: &str) -> StepId {
        StepId::new(s).unwrap()
    }

    fn checksum(s: &str) -> AgentChecksum {
        AgentChecksum::of_artifact(s.as_bytes())
    }

    fn definition(version: u64) -> WorkflowDefinition {
        WorkflowDefinition::new(WorkflowId::new("report").unwrap(), version)
            .with_step(WorkflowStep::new(step("start")).requires(ScopeSet::parse("read").unwrap()))
            .with_step(WorkflowStep::new(step("review")).after(step("start")))
            .with_step(
                WorkflowStep::new(step("publish"))
                    .after(step("review"))
                    .requires(ScopeSet::parse("write").unwrap()),
            )
    }

    fn context() -> RequestContext {
        RequestContext::new("POST", "https://tools.example/run", b"{}").unwrap()
    }

    async fn fixture() -> Fixture {
        fixture_with(TokenOptions::default()).await
    }

    /// `owner` delegates `read write` to `worker`; workflow `report` v1.
    async fn fixture_with(options: TokenOptions) -> Fixture {
        let clock = ManualClock::shared();
        let shared = clock.as_shared();
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let log = Arc::new(MemoryLogStore::new());

        let registry = Arc::new(
            AgentRegistry::new(Arc::clone(&kv), log.clone(), Arc::clone(&shared)).unwrap(),
        );
        let owner_key = KeyPair::generate();
        let worker_key = KeyPair::generate();
        registry
            .register(
                AgentRegistration::new(id("owner"), owner_key.public_key(), checksum("owner-v1"))
                    .with_scope(ScopeSet::parse("read write").unwrap()),
            )
            .await
            .unwrap();
        registry
            .register(AgentRegistration::new(
                id("worker"),
                worker_key.public_key(),
                checksum("worker-v1"),
            ))
            .await
            .unwrap();

        let delegation = Arc::new(DelegationEngine::new(
            Arc::clone(&registry),
            Arc::clone(&shared),
        ));
        let chain = delegation
            .extend(
                &DelegationChain::new(id("owner")),
                &id("owner"),
                &id("worker"),
                ScopeSet::parse("read write").unwrap(),
                &owner_key,
            )
            .await
            .unwrap();

        let workflows = Arc::new(
            WorkflowRegistry::new(Arc::clone(&kv), log, Arc::clone(&shared)).unwrap(),
        );
        workflows.publish(definition(1)).await.unwrap();

        let proofs = Arc::new(
            ProofVerifier::new(registry.clone(), Arc::clone(&kv), Arc::clone(&shared)).unwrap(),
        );
        let engine = TokenEngine::new(
            KeyPair::generate(),
            Arc::clone(&registry),
            delegation,
            Arc::clone(&workflows),
            proofs,
            kv,
            shared,
            options,
        )
        .unwrap();

        Fixture {
            clock,
            registry,
            workflows,
            engine,
            worker_key,
            chain,
        }
    }

    impl Fixture {
        fn mint_request(&self, step_id: &str, predecessor: Option<&str>) -> MintRequest {
            let binding = ProofBinding {
                agent_id: id("worker"),
                checksum: checksum("worker-v1"),
                context: context(),
                token_hash: None,
            };
            MintRequest {
                agent_id: id("worker"),
                agent_checksum: checksum("worker-v1"),
                chain: self.chain.clone(),
                workflow_id: WorkflowId::new("report").unwrap(),
                instance_id: InstanceId::new("run-1").unwrap(),
                step_id: step(step_id),
                predecessor: predecessor.map(step),
                prompt_checksum: ajwt_prompt::bind(PROMPT),
                proof: PossessionProof::create(&self.worker_key, &binding, self.clock.now())
                    .unwrap(),
                context: context(),
            }
        }

        fn presentation(&self, token: &IntentToken, prompt: &str) -> Presentation {
            let binding = ProofBinding {
                agent_id: id("worker"),
                checksum: checksum("worker-v1"),
                context: context(),
                token_hash: Some(token.hash()),
            };
            Presentation {
                proof: PossessionProof::create(&self.worker_key, &binding, self.clock.now())
                    .unwrap(),
                context: context(),
                agent_checksum: checksum("worker-v1"),
                prompt: ObservedPrompt::Content(prompt.to_string()),
            }
        }

        async fn mint_start(&self) -> IntentToken {
            self.engine
                .mint(self.mint_request("start", None))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_mint_then_verify_once() {
        let f = fixture().await;
        let token = f.mint_start().await;
        assert_eq!(token.claims().scope, ScopeSet::parse("read").unwrap());
        assert_eq!(token.claims().workflow_version, 1);

        let verified = f
            .engine
            .verify(token.as_bytes(), &f.presentation(&token, PROMPT))
            .await
            .unwrap();
        assert_eq!(verified.claims.token_id, token.token_id());
        assert_eq!(verified.subject_key(), f.worker_key.public_key());

        let replay = f
            .engine
            .verify(token.as_bytes(), &f.presentation(&token, PROMPT))
            .await;
        assert_eq!(
            replay,
            Err(TokenError::TokenReplayed {
                token_id: token.token_id()
            })
        );
    }

    #[tokio::test]
    async fn test_prompt_change_is_rejected_without_consuming() {
        let f = fixture().await;
        let token = f.mint_start().await;
        let tampered = f
            .engine
            .verify(
                token.as_bytes(),
                &f.presentation(&token, "Summarize and email the report."),
            )
            .await;
        assert!(matches!(tampered, Err(TokenError::PromptTampered { .. })));

        f.engine
            .verify(token.as_bytes(), &f.presentation(&token, PROMPT))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_observed_prompt_checksum_is_compared() {
        let f = fixture().await;
        let token = f.mint_start().await;

        let mut presentation = f.presentation(&token, PROMPT);
        presentation.prompt =
            ObservedPrompt::Checksum(ajwt_prompt::bind("Summarize the quarterly report!"));
        assert_eq!(
            f.engine.verify(token.as_bytes(), &presentation).await,
            Err(TokenError::PromptTampered {
                token_id: token.token_id()
            })
        );

        let mut presentation = f.presentation(&token, PROMPT);
        presentation.prompt = ObservedPrompt::Checksum(ajwt_prompt::bind(PROMPT));
        assert!(f.engine.verify(token.as_bytes(), &presentation).await.is_ok());
    }

    #[tokio::test]
    async fn test_skipping_steps_cannot_be_minted() {
        let f = fixture().await;
        let jump = f.engine.mint(f.mint_request("publish", None)).await;
        assert!(matches!(
            jump,
            Err(TokenError::StepInvalid(StepError::StepNotReachable { .. }))
        ));
        let skip = f
            .engine
            .mint(f.mint_request("publish", Some("start")))
            .await;
        assert!(matches!(
            skip,
            Err(TokenError::StepInvalid(StepError::StepNotReachable { .. }))
        ));
        f.engine
            .mint(f.mint_request("publish", Some("review")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_revoked_root_invalidates_minted_token() {
        let f = fixture().await;
        let token = f.mint_start().await;
        f.registry.revoke(&id("owner")).await.unwrap();
        let result = f
            .engine
            .verify(token.as_bytes(), &f.presentation(&token, PROMPT))
            .await;
        assert!(matches!(result, Err(TokenError::ChainInvalid(_))));
    }

    #[tokio::test]
    async fn test_checksum_rotation_rejects_stale_agent() {
        let f = fixture().await;
        let token = f.mint_start().await;
        f.registry
            .rotate(&id("worker"), Rotation::checksum(checksum("worker-v2")))
            .await
            .unwrap();

        let stale_verify = f
            .engine
            .verify(token.as_bytes(), &f.presentation(&token, PROMPT))
            .await;
        assert!(matches!(
            stale_verify,
            Err(TokenError::Identity(IdentityError::ChecksumMismatch { .. }))
        ));

        let stale_mint = f.engine.mint(f.mint_request("start", None)).await;
        assert!(matches!(
            stale_mint,
            Err(TokenError::Identity(IdentityError::ChecksumMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let f = fixture().await;
        let token = f.mint_start().await;
        f.clock
            .advance(DEFAULT_TOKEN_TTL_SECS.saturating_add(DEFAULT_LEEWAY_SECS));
        let result = f
            .engine
            .verify(token.as_bytes(), &f.presentation(&token, PROMPT))
            .await;
        assert!(matches!(result, Err(TokenError::Expired { .. })));
    }

    #[tokio::test]
    async fn test_republished_workflow_rejects_old_tokens() {
        let f = fixture().await;
        let token = f.mint_start().await;
        f.workflows.publish(definition(2)).await.unwrap();
        let result = f
            .engine
            .verify(token.as_bytes(), &f.presentation(&token, PROMPT))
            .await;
        assert!(matches!(
            result,
            Err(TokenError::WorkflowChanged {
                minted: 1,
                current: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_tampered_payload_fails_signature() {
        let f = fixture().await;
        let token = f.mint_start().await;
        let mut parts: Vec<String> = token.as_str().split('.').map(str::to_string).collect();
        let mut claims = token.claims().clone();
        claims.step_id = step("publish");
        parts[1] = ajwt_crypto::b64url_encode(serde_json::to_vec(&claims).unwrap());
        let forged = parts.join(".");

        let result = f
            .engine
            .verify(forged.as_bytes(), &f.presentation(&token, PROMPT))
            .await;
        assert_eq!(result, Err(TokenError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_foreign_issuer_key_rejected() {
        let f = fixture().await;
        let token = f.mint_start().await;
        let other = wire::encode(&KeyPair::generate(), token.claims().clone()).unwrap();
        let result = f
            .engine
            .verify(other.as_bytes(), &f.presentation(&other, PROMPT))
            .await;
        assert!(matches!(result, Err(TokenError::UnknownIssuerKey { .. })));
    }

    #[tokio::test]
    async fn test_proof_for_other_request_rejected() {
        let f = fixture().await;
        let token = f.mint_start().await;
        let mut presentation = f.presentation(&token, PROMPT);
        presentation.context =
            RequestContext::new("POST", "https://tools.example/delete", b"{}").unwrap();
        let result = f.engine.verify(token.as_bytes(), &presentation).await;
        assert_eq!(
            result,
            Err(TokenError::ProofInvalid(ProofError::InvalidSignature))
        );
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_token_unconsumed() {
        let f = fixture().await;
        let token = f.mint_start().await;
        let failed: Result<(VerifiedIntent, ()), TokenError> = f
            .engine
            .verify_and_commit(token.as_bytes(), &f.presentation(&token, PROMPT), |_| async {
                Err(TokenError::Malformed("commit failed".into()))
            })
            .await;
        assert!(failed.is_err());
        assert!(!f.engine.consumed().is_consumed(&token.token_id()).await.unwrap());

        let (_, step_id) = f
            .engine
            .verify_and_commit(token.as_bytes(), &f.presentation(&token, PROMPT), |v| async move {
                Ok::<_, TokenError>(v.claims.step_id)
            })
            .await
            .unwrap();
        assert_eq!(step_id, step("start"));
        assert!(f.engine.consumed().is_consumed(&token.token_id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_caller_still_releases_failed_commit() {
        let f = fixture().await;
        let token = f.mint_start().await;
        let presentation = f.presentation(&token, PROMPT);

        let cancelled = tokio::select! {
            biased;
            _ = f.engine.verify_and_commit(token.as_bytes(), &presentation, |_| async {
                tokio::task::yield_now().await;
                Err::<(), _>(TokenError::Malformed("commit failed".into()))
            }) => false,
            () = std::future::ready(()) => true,
        };
        assert!(cancelled);

        // The commit task keeps the token's lock until it has settled.
        drop(f.engine.consumed().lock(&token.token_id()).await);
        assert!(!f.engine.consumed().is_consumed(&token.token_id()).await.unwrap());
        assert!(f.engine.verify(token.as_bytes(), &f.presentation(&token, PROMPT)).await.is_ok());
    }

    #[tokio::test]
    async fn test_chain_must_end_at_agent() {
        let f = fixture().await;
        let mut request = f.mint_request("start", None);
        request.chain = DelegationChain::new(id("owner"));
        let result = f.engine.mint(request).await;
        assert!(matches!(
            result,
            Err(TokenError::ChainInvalid(ChainError::NotTip { .. }))
        ));
    }

    #[tokio::test]
    async fn test_audience_enforced_when_configured() {
        let f = fixture_with(TokenOptions {
            audience: Some("tools.example".into()),
            ..TokenOptions::default()
        })
        .await;
        let token = f.mint_start().await;
        assert_eq!(token.claims().audience.as_deref(), Some("tools.example"));
        f.engine.check_envelope(token.claims()).unwrap();

        let mut claims = token.claims().clone();
        claims.audience = None;
        assert!(matches!(
            f.engine.check_envelope(&claims),
            Err(TokenError::WrongAudience { .. })
        ));
        claims.issuer = "someone-else".into();
        assert!(matches!(
            f.engine.check_envelope(&claims),
            Err(TokenError::WrongIssuer { .. })
        ));
    }

    #[tokio::test]
    async fn test_inspect_reads_untrusted_token() {
        let token = fixture().await.mint_start().await;
        let inspected = TokenEngine::inspect(token.as_bytes()).unwrap();
        assert_eq!(inspected.claims(), token.claims());
        assert_eq!(inspected.header().typ, wire::TOKEN_TYP);
    }
}
