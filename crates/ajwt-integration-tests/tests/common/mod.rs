//! Shared harness for integration tests.

use std::sync::Arc;

use ajwt_authority::{Accepted, Authority, Backends};
use ajwt_config::Config;
use ajwt_core::Clock;
use ajwt_crypto::KeyPair;
use ajwt_delegation::DelegationChain;
use ajwt_storage::MemoryKvStore;
use ajwt_test::{
    ManualClock, TEST_PROMPT, TestAgent, TestLogStore, report_workflow, test_context,
    test_instance, test_scope, test_step, test_workflow_id,
};
use ajwt_token::{IntentToken, MintRequest, ObservedPrompt, Presentation};

/// An authority with `owner -> lead -> worker` delegating `read write` and
/// workflow `report` v1 published.
#[allow(dead_code)]
pub struct Harness {
    /// The clock every component reads.
    pub clock: Arc<ManualClock>,
    /// The key-value backend.
    pub kv: Arc<MemoryKvStore>,
    /// The log backend, tamperable.
    pub log: Arc<TestLogStore>,
    /// The composed protocol.
    pub authority: Arc<Authority>,
    /// Chain root, holding `read write`.
    pub owner: TestAgent,
    /// Middle of the chain.
    pub lead: TestAgent,
    /// Chain tip; executes steps.
    pub worker: TestAgent,
    /// `owner -> lead -> worker`.
    pub chain: DelegationChain,
    issuer_secret: [u8; 32],
}

#[allow(dead_code)]
impl Harness {
    /// Build the default scenario.
    pub async fn new() -> Self {
        ajwt_test::init_test_logging();
        let clock = ManualClock::shared();
        let kv = Arc::new(MemoryKvStore::new());
        let log = Arc::new(TestLogStore::new());
        let issuer = KeyPair::generate();
        let issuer_secret = *issuer.secret_key_bytes();
        let authority = Arc::new(
            Authority::with_parts(
                &Config::default(),
                Backends::new(kv.clone(), log.clone()),
                clock.as_shared(),
                issuer,
            )
            .unwrap(),
        );

        let owner = TestAgent::new("owner");
        let lead = TestAgent::new("lead");
        let worker = TestAgent::new("worker");
        authority
            .register(owner.registration_with_scope("read write"))
            .await
            .unwrap();
        authority.register(lead.registration()).await.unwrap();
        authority.register(worker.registration()).await.unwrap();

        let chain = authority
            .delegate(
                &DelegationChain::new(owner.id.clone()),
                &owner.id,
                &lead.id,
                test_scope("read write"),
                &owner.key,
            )
            .await
            .unwrap();
        let chain = authority
            .delegate(&chain, &lead.id, &worker.id, test_scope("read write"), &lead.key)
            .await
            .unwrap();
        authority.publish(report_workflow(1)).await.unwrap();

        Self {
            clock,
            kv,
            log,
            authority,
            owner,
            lead,
            worker,
            chain,
            issuer_secret,
        }
    }

    /// A second authority over the same backends, clock, and issuer key.
    pub fn peer(&self) -> Authority {
        Authority::with_parts(
            &Config::default(),
            Backends::new(self.kv.clone(), self.log.clone()),
            self.clock.as_shared(),
            KeyPair::from_secret_key(&self.issuer_secret).unwrap(),
        )
        .unwrap()
    }

    /// A mint request from the worker.
    pub fn request(&self, instance: &str, step: &str, predecessor: Option<&str>) -> MintRequest {
        self.request_with_prompt(instance, step, predecessor, TEST_PROMPT)
    }

    /// A mint request binding `prompt`.
    pub fn request_with_prompt(
        &self,
        instance: &str,
        step: &str,
        predecessor: Option<&str>,
        prompt: &str,
    ) -> MintRequest {
        MintRequest {
            agent_id: self.worker.id.clone(),
            agent_checksum: self.worker.checksum,
            chain: self.chain.clone(),
            workflow_id: test_workflow_id("report"),
            instance_id: test_instance(instance),
            step_id: test_step(step),
            predecessor: predecessor.map(test_step),
            prompt_checksum: ajwt_prompt::bind(prompt),
            proof: self.worker.mint_proof(&test_context(), self.clock.now()),
            context: test_context(),
        }
    }

    /// A presentation of `token` with the default prompt.
    pub fn presentation(&self, token: &IntentToken) -> Presentation {
        self.presentation_with_prompt(token, TEST_PROMPT)
    }

    /// A presentation of `token` observing `prompt`.
    pub fn presentation_with_prompt(&self, token: &IntentToken, prompt: &str) -> Presentation {
        Presentation {
            proof: self
                .worker
                .presentation_proof(&test_context(), token.hash(), self.clock.now()),
            context: test_context(),
            agent_checksum: self.worker.checksum,
            prompt: ObservedPrompt::Content(prompt.to_owned()),
        }
    }

    /// Mint a token for `step`.
    pub async fn mint(&self, instance: &str, step: &str, predecessor: Option<&str>) -> IntentToken {
        self.authority
            .mint(self.request(instance, step, predecessor))
            .await
            .unwrap()
    }

    /// Mint and accept `step`.
    pub async fn run(&self, instance: &str, step: &str, predecessor: Option<&str>) -> Accepted {
        let token = self.mint(instance, step, predecessor).await;
        self.authority
            .accept(token.as_bytes(), &self.presentation(&token))
            .await
            .unwrap()
    }

    /// The log stream backing `instance`.
    pub fn stream_of(&self, instance: &str) -> String {
        let stream = format!("exec:{instance}");
        assert!(self.log.streams_with_prefix("exec:").contains(&stream));
        stream
    }
}
