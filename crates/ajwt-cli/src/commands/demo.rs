//! Demo command: one workflow run against an in-memory authority.

use ajwt_authority::{Authority, AuthorityError, Backends};
use ajwt_config::Config;
use ajwt_core::{AgentId, InstanceId, ScopeSet, StepId, WorkflowId, system_clock};
use ajwt_crypto::KeyPair;
use ajwt_delegation::DelegationChain;
use ajwt_pop::{AgentChecksum, PossessionProof, ProofBinding, RequestContext};
use ajwt_registry::{AgentRegistration, Rotation};
use ajwt_token::{IntentToken, MintRequest, ObservedPrompt, Presentation, TokenError};
use ajwt_workflow::{WorkflowDefinition, WorkflowStep};

use crate::theme::Theme;

const PROMPT: &str = "Summarize the quarterly report.";

struct Agent {
    id: AgentId,
    key: KeyPair,
    checksum: AgentChecksum,
}

impl Agent {
    fn new(name: &str, artifact: &str) -> anyhow::Result<Self> {
        Ok(Self {
            id: AgentId::new(name)?,
            key: KeyPair::generate(),
            checksum: AgentChecksum::of_artifact(artifact.as_bytes()),
        })
    }

    fn binding(&self, context: &RequestContext, token: Option<&IntentToken>) -> ProofBinding {
        ProofBinding {
            agent_id: self.id.clone(),
            checksum: self.checksum,
            context: context.clone(),
            token_hash: token.map(IntentToken::hash),
        }
    }
}

struct Run<'a> {
    authority: &'a Authority,
    worker: &'a Agent,
    chain: DelegationChain,
    instance_id: InstanceId,
    context: RequestContext,
}

impl Run<'_> {
    fn mint_request(&self, step: &str, predecessor: Option<&str>) -> anyhow::Result<MintRequest> {
        let now = self.authority.clock().now();
        Ok(MintRequest {
            agent_id: self.worker.id.clone(),
            agent_checksum: self.worker.checksum,
            chain: self.chain.clone(),
            workflow_id: WorkflowId::new("report")?,
            instance_id: self.instance_id.clone(),
            step_id: StepId::new(step)?,
            predecessor: predecessor.map(StepId::new).transpose()?,
            prompt_checksum: ajwt_prompt::bind(PROMPT),
            proof: PossessionProof::create(
                &self.worker.key,
                &self.worker.binding(&self.context, None),
                now,
            )?,
            context: self.context.clone(),
        })
    }

    fn presentation(&self, token: &IntentToken) -> anyhow::Result<Presentation> {
        let now = self.authority.clock().now();
        Ok(Presentation {
            proof: PossessionProof::create(
                &self.worker.key,
                &self.worker.binding(&self.context, Some(token)),
                now,
            )?,
            context: self.context.clone(),
            agent_checksum: self.worker.checksum,
            prompt: ObservedPrompt::Content(PROMPT.to_owned()),
        })
    }

    async fn step(&self, step: &str, predecessor: Option<&str>) -> anyhow::Result<IntentToken> {
        let token = self
            .authority
            .mint(self.mint_request(step, predecessor)?)
            .await?;
        let accepted = self
            .authority
            .accept(token.as_bytes(), &self.presentation(&token)?)
            .await?;
        println!(
            "{}",
            Theme::success(&format!(
                "{step}: token {} accepted, log entry #{}",
                token.token_id(),
                accepted.entry.sequence_no
            ))
        );
        Ok(token)
    }
}

fn report_workflow() -> anyhow::Result<WorkflowDefinition> {
    Ok(WorkflowDefinition::new(WorkflowId::new("report")?, 1)
        .with_step(WorkflowStep::new(StepId::new("start")?).requires(ScopeSet::parse("read")?))
        .with_step(WorkflowStep::new(StepId::new("review")?).after(StepId::new("start")?))
        .with_step(
            WorkflowStep::new(StepId::new("publish")?)
                .after(StepId::new("review")?)
                .requires(ScopeSet::parse("write")?),
        ))
}

fn expect_rejection<T>(what: &str, result: Result<T, AuthorityError>) -> anyhow::Result<()> {
    match result {
        Ok(_) => anyhow::bail!("{what} was accepted"),
        Err(e) => {
            println!("{}", Theme::rejected(&format!("{what}: {e}")));
            Ok(())
        },
    }
}

/// Register two agents, delegate, run workflow `report`, and show the
/// rejections for a replay, a skipped step, and a stale checksum.
pub(crate) async fn run_demo(config: &Config) -> anyhow::Result<()> {
    let authority = Authority::with_parts(
        config,
        Backends::in_memory(),
        system_clock(),
        KeyPair::generate(),
    )?;
    println!("\n{}", Theme::header("A-JWT demo (in-memory)"));

    let owner = Agent::new("owner", "owner-v1")?;
    let worker = Agent::new("worker", "worker-v1")?;
    authority
        .register(
            AgentRegistration::new(owner.id.clone(), owner.key.public_key(), owner.checksum)
                .with_scope(ScopeSet::parse("read write")?),
        )
        .await?;
    authority
        .register(AgentRegistration::new(
            worker.id.clone(),
            worker.key.public_key(),
            worker.checksum,
        ))
        .await?;
    let chain = authority
        .delegate(
            &DelegationChain::new(owner.id.clone()),
            &owner.id,
            &worker.id,
            ScopeSet::parse("read write")?,
            &owner.key,
        )
        .await?;
    authority.publish(report_workflow()?).await?;
    println!("{}", Theme::note("registered owner and worker, owner delegated read write"));

    let run = Run {
        authority: &authority,
        worker: &worker,
        chain,
        instance_id: InstanceId::generate(),
        context: RequestContext::new("POST", "https://tools.example/run", b"{}")?,
    };

    let start = run.step("start", None).await?;
    expect_rejection(
        "replaying the start token",
        authority
            .accept(start.as_bytes(), &run.presentation(&start)?)
            .await,
    )?;
    expect_rejection(
        "jumping to publish",
        authority.mint(run.mint_request("publish", Some("start"))?).await,
    )?;
    run.step("review", Some("start")).await?;
    run.step("publish", Some("review")).await?;

    authority.verify_log(&run.instance_id).await?;
    println!("{}", Theme::success("execution log verified"));

    authority
        .rotate(
            &worker.id,
            Rotation::checksum(AgentChecksum::of_artifact(b"worker-v2")),
        )
        .await?;
    let mut request = run.mint_request("start", None)?;
    request.instance_id = InstanceId::generate();
    match authority.mint(request).await {
        Err(AuthorityError::Token(TokenError::Identity(e))) => {
            println!("{}", Theme::rejected(&format!("minting with the old checksum: {e}")));
        },
        other => anyhow::bail!("expected an identity rejection, got {other:?}"),
    }
    println!();
    Ok(())
}
