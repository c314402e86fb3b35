//! The agent registry.
//!
//! Agent records live in a [`KvStore`] namespace keyed by agent id. Every
//! committed version of a record is also appended to a per-agent history
//! stream in a [`LogStore`], so the full lifecycle stays auditable after
//! rotation or revocation. Mutations for one agent are serialized through a
//! per-agent lock and committed with compare-and-swap.

use std::sync::Arc;

use ajwt_core::{AgentId, AgentStatus, AppId, SharedClock};
use ajwt_crypto::PublicKey;
use ajwt_pop::{AgentChecksum, KeyDirectory, KeyLookupError, KeyLookupResult};
use ajwt_storage::{
    KeyedLocks, KvStore, LogStore, ScopedKvStore, StorageError, next_sequence,
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentRegistration, Rotation};
use crate::error::{IdentityError, IdentityResult};

/// KV namespace holding agent records.
pub const AGENTS_NAMESPACE: &str = "ajwt:agents";
/// KV namespace mapping checksum hex to the agent that holds it.
pub const CHECKSUM_INDEX_NAMESPACE: &str = "ajwt:checksums";

/// Registry behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// New agents start `pending` and need [`AgentRegistry::activate`].
    pub require_activation: bool,
    /// Refuse two live agents with the same code checksum.
    pub reject_checksum_collisions: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            require_activation: false,
            reject_checksum_collisions: true,
        }
    }
}

fn history_stream(agent_id: &AgentId) -> String {
    format!("agent:{agent_id}")
}

/// Registration-first identity store for agents.
pub struct AgentRegistry {
    agents: ScopedKvStore,
    checksums: ScopedKvStore,
    history: Arc<dyn LogStore>,
    locks: KeyedLocks,
    clock: SharedClock,
    options: RegistryOptions,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AgentRegistry {
    /// Create a registry over the given backends.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Storage`] if the namespaces are rejected by
    /// the backend.
    pub fn new(
        kv: Arc<dyn KvStore>,
        log: Arc<dyn LogStore>,
        clock: SharedClock,
    ) -> IdentityResult<Self> {
        Ok(Self {
            agents: ScopedKvStore::new(Arc::clone(&kv), AGENTS_NAMESPACE)?,
            checksums: ScopedKvStore::new(kv, CHECKSUM_INDEX_NAMESPACE)?,
            history: log,
            locks: KeyedLocks::new(),
            clock,
            options: RegistryOptions::default(),
        })
    }

    /// Replace the behavior switches.
    #[must_use]
    pub fn with_options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    /// The active behavior switches.
    #[must_use]
    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Register a new agent.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::DuplicateAgent`] if the id is already registered.
    /// - [`IdentityError::RevokedAgent`] if the id belonged to a revoked agent.
    /// - [`IdentityError::ChecksumCollision`] if another live agent holds the
    ///   same checksum.
    pub async fn register(&self, registration: AgentRegistration) -> IdentityResult<Agent> {
        let agent_id = registration.agent_id;
        let _guard = self.locks.lock(agent_id.as_str()).await;

        if let Some(existing) = self.load(&agent_id).await? {
            return Err(if existing.status.is_revoked() {
                IdentityError::RevokedAgent { agent_id }
            } else {
                IdentityError::DuplicateAgent { agent_id }
            });
        }

        let now = self.clock.now();
        let agent = Agent {
            agent_id,
            public_key: registration.public_key,
            code_checksum: registration.code_checksum,
            granted_scope: registration.granted_scope,
            app_id: registration.app_id,
            registration_version: 1,
            status: if self.options.require_activation {
                AgentStatus::Pending
            } else {
                AgentStatus::Active
            },
            registered_at: now,
            updated_at: now,
        };

        self.claim_checksum(&agent.agent_id, &agent.code_checksum)
            .await?;
        if let Err(e) = self.commit(None, &agent).await {
            self.release_checksum(&agent.agent_id, &agent.code_checksum)
                .await;
            return Err(e);
        }
        if let Err(e) = self.append_history(&agent).await {
            if let Err(undo) = self.agents.delete(agent.agent_id.as_str()).await {
                warn!(agent_id = %agent.agent_id, error = %undo, "failed to undo registration");
            }
            self.release_checksum(&agent.agent_id, &agent.code_checksum)
                .await;
            return Err(e);
        }

        info!(
            agent_id = %agent.agent_id,
            status = %agent.status,
            key_id = %agent.public_key.key_id_hex(),
            "agent registered"
        );
        Ok(agent)
    }

    /// Register several agents in order.
    ///
    /// Each registration is checked and committed on its own, so one
    /// rejection does not undo or block the others. Results line up with
    /// `registrations`.
    pub async fn register_batch(
        &self,
        registrations: Vec<AgentRegistration>,
    ) -> Vec<IdentityResult<Agent>> {
        let mut results = Vec::with_capacity(registrations.len());
        for registration in registrations {
            results.push(self.register(registration).await);
        }
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        info!(accepted, total = results.len(), "agent batch registered");
        results
    }

    /// Move a pending agent to active. Activating an active agent is a no-op.
    ///
    /// # Errors
    ///
    /// [`IdentityError::UnknownAgent`] or [`IdentityError::RevokedAgent`].
    pub async fn activate(&self, agent_id: &AgentId) -> IdentityResult<Agent> {
        let _guard = self.locks.lock(agent_id.as_str()).await;
        let current = self.load_existing(agent_id).await?;
        match current.status {
            AgentStatus::Revoked => Err(IdentityError::RevokedAgent {
                agent_id: agent_id.clone(),
            }),
            AgentStatus::Active => Ok(current),
            AgentStatus::Pending => {
                let mut next = current.clone();
                next.status = AgentStatus::Active;
                next.updated_at = self.clock.now();
                self.commit_with_history(&current, &next).await?;
                info!(agent_id = %agent_id, "agent activated");
                Ok(next)
            },
        }
    }

    /// Apply a material change and bump `registration_version`.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::UnknownAgent`] if absent.
    /// - [`IdentityError::RevokedAgent`] if revoked.
    /// - [`IdentityError::NoChange`] if the rotation changes nothing.
    /// - [`IdentityError::ChecksumCollision`] if the new checksum is taken.
    pub async fn rotate(&self, agent_id: &AgentId, rotation: Rotation) -> IdentityResult<Agent> {
        let _guard = self.locks.lock(agent_id.as_str()).await;
        let current = self.load_existing(agent_id).await?;
        if current.status.is_revoked() {
            return Err(IdentityError::RevokedAgent {
                agent_id: agent_id.clone(),
            });
        }
        if !rotation.changes(&current) {
            return Err(IdentityError::NoChange {
                agent_id: agent_id.clone(),
            });
        }

        let mut next = current.clone();
        if let Some(key) = rotation.public_key {
            next.public_key = key;
        }
        if let Some(checksum) = rotation.code_checksum {
            next.code_checksum = checksum;
        }
        if let Some(scope) = rotation.granted_scope {
            next.granted_scope = scope;
        }
        next.registration_version = current.registration_version.saturating_add(1);
        next.updated_at = self.clock.now();

        let checksum_changed = next.code_checksum != current.code_checksum;
        if checksum_changed {
            self.claim_checksum(agent_id, &next.code_checksum).await?;
        }
        if let Err(e) = self.commit_with_history(&current, &next).await {
            if checksum_changed {
                self.release_checksum(agent_id, &next.code_checksum).await;
            }
            return Err(e);
        }
        if checksum_changed {
            self.release_checksum(agent_id, &current.code_checksum)
                .await;
        }

        info!(
            agent_id = %agent_id,
            registration_version = next.registration_version,
            key_rotated = next.public_key != current.public_key,
            checksum_changed,
            "agent rotated"
        );
        Ok(next)
    }

    /// Permanently revoke an agent. Revoking twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`IdentityError::UnknownAgent`] if absent.
    pub async fn revoke(&self, agent_id: &AgentId) -> IdentityResult<Agent> {
        let _guard = self.locks.lock(agent_id.as_str()).await;
        let current = self.load_existing(agent_id).await?;
        if current.status.is_revoked() {
            return Ok(current);
        }
        let mut next = current.clone();
        next.status = AgentStatus::Revoked;
        next.updated_at = self.clock.now();
        self.commit_with_history(&current, &next).await?;
        self.release_checksum(agent_id, &current.code_checksum)
            .await;
        warn!(agent_id = %agent_id, "agent revoked");
        Ok(next)
    }

    /// Whether `observed` equals the agent's registered checksum.
    ///
    /// # Errors
    ///
    /// [`IdentityError::UnknownAgent`] if absent.
    pub async fn verify_checksum(
        &self,
        agent_id: &AgentId,
        observed: &AgentChecksum,
    ) -> IdentityResult<bool> {
        let agent = self.load_existing(agent_id).await?;
        let matches = agent.code_checksum == *observed;
        if !matches {
            warn!(agent_id = %agent_id, "agent checksum mismatch");
        }
        Ok(matches)
    }

    /// Load an agent that must be active and running the registered code.
    ///
    /// # Errors
    ///
    /// Any error of [`require_active`](Self::require_active), or
    /// [`IdentityError::ChecksumMismatch`].
    pub async fn require_checksum(
        &self,
        agent_id: &AgentId,
        observed: &AgentChecksum,
    ) -> IdentityResult<Agent> {
        let agent = self.require_active(agent_id).await?;
        if agent.code_checksum != *observed {
            warn!(agent_id = %agent_id, "agent checksum mismatch");
            return Err(IdentityError::ChecksumMismatch {
                agent_id: agent_id.clone(),
            });
        }
        Ok(agent)
    }

    /// Load an agent that must be active.
    ///
    /// # Errors
    ///
    /// [`IdentityError::UnknownAgent`], [`IdentityError::RevokedAgent`], or
    /// [`IdentityError::AgentNotActive`] for a pending agent.
    pub async fn require_active(&self, agent_id: &AgentId) -> IdentityResult<Agent> {
        let agent = self.load_existing(agent_id).await?;
        match agent.status {
            AgentStatus::Active => Ok(agent),
            AgentStatus::Revoked => Err(IdentityError::RevokedAgent {
                agent_id: agent_id.clone(),
            }),
            status @ AgentStatus::Pending => Err(IdentityError::AgentNotActive {
                agent_id: agent_id.clone(),
                status,
            }),
        }
    }

    /// Fetch an agent record.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Storage`] on backend failure.
    pub async fn get(&self, agent_id: &AgentId) -> IdentityResult<Option<Agent>> {
        self.load(agent_id).await
    }

    /// All agents, sorted by id. Revoked agents are included.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Storage`] on backend failure.
    pub async fn list(&self) -> IdentityResult<Vec<Agent>> {
        let mut agents = Vec::new();
        for key in self.agents.list_keys().await? {
            if let Some(agent) = self.agents.get_json::<Agent>(&key).await? {
                agents.push(agent);
            }
        }
        Ok(agents)
    }

    /// Agents registered under `app_id`, sorted by id.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Storage`] on backend failure.
    pub async fn list_for_app(&self, app_id: &AppId) -> IdentityResult<Vec<Agent>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|agent| agent.app_id.as_ref() == Some(app_id))
            .collect())
    }

    /// Every committed version of an agent record, oldest first.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Storage`] on backend failure or a corrupt entry.
    pub async fn history(&self, agent_id: &AgentId) -> IdentityResult<Vec<Agent>> {
        self.history
            .read(&history_stream(agent_id))
            .await?
            .into_iter()
            .map(|record| {
                serde_json::from_slice::<Agent>(&record.data).map_err(|e| {
                    IdentityError::from(StorageError::Serialization(e.to_string()))
                })
            })
            .collect()
    }

    async fn load(&self, agent_id: &AgentId) -> IdentityResult<Option<Agent>> {
        Ok(self.agents.get_json(agent_id.as_str()).await?)
    }

    async fn load_existing(&self, agent_id: &AgentId) -> IdentityResult<Agent> {
        self.load(agent_id)
            .await?
            .ok_or_else(|| IdentityError::UnknownAgent {
                agent_id: agent_id.clone(),
            })
    }

    /// Swap the stored record from `expected` to `next`.
    async fn commit(&self, expected: Option<&Agent>, next: &Agent) -> IdentityResult<()> {
        let swapped = self
            .agents
            .compare_and_swap_json(next.agent_id.as_str(), expected, next)
            .await?;
        if swapped {
            Ok(())
        } else {
            Err(StorageError::Unavailable(format!(
                "agent {} modified concurrently",
                next.agent_id
            ))
            .into())
        }
    }

    /// Commit `next` and append it to history, restoring `current` if the
    /// history append fails.
    async fn commit_with_history(&self, current: &Agent, next: &Agent) -> IdentityResult<()> {
        self.commit(Some(current), next).await?;
        if let Err(e) = self.append_history(next).await {
            if let Err(undo) = self.commit(Some(next), current).await {
                warn!(agent_id = %next.agent_id, error = %undo, "failed to restore agent record");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn append_history(&self, agent: &Agent) -> IdentityResult<()> {
        let stream = history_stream(&agent.agent_id);
        let last = self.history.last(&stream).await?;
        let data =
            serde_json::to_vec(agent).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.history
            .append(&stream, next_sequence(last.as_ref()), data)
            .await?;
        Ok(())
    }

    async fn claim_checksum(
        &self,
        agent_id: &AgentId,
        checksum: &AgentChecksum,
    ) -> IdentityResult<()> {
        if !self.options.reject_checksum_collisions {
            return Ok(());
        }
        let key = checksum.to_hex();
        if self.checksums.insert_new_json(&key, agent_id).await? {
            return Ok(());
        }
        match self.checksums.get_json::<AgentId>(&key).await? {
            Some(holder) if holder == *agent_id => Ok(()),
            Some(holder) => {
                warn!(agent_id = %agent_id, existing = %holder, "agent checksum already registered");
                Err(IdentityError::ChecksumCollision {
                    checksum: *checksum,
                    existing: holder,
                })
            },
            None => Err(StorageError::Unavailable(format!(
                "checksum index entry {key} changed concurrently"
            ))
            .into()),
        }
    }

    /// Drop the index entry for `checksum` if `agent_id` holds it.
    async fn release_checksum(&self, agent_id: &AgentId, checksum: &AgentChecksum) {
        if !self.options.reject_checksum_collisions {
            return;
        }
        let key = checksum.to_hex();
        let result = async {
            if self.checksums.get_json::<AgentId>(&key).await?.as_ref() == Some(agent_id) {
                self.checksums.delete(&key).await?;
            }
            Ok::<(), StorageError>(())
        }
        .await;
        if let Err(e) = result {
            warn!(agent_id = %agent_id, error = %e, "failed to release checksum index entry");
        }
    }
}

#[async_trait]
impl KeyDirectory for AgentRegistry {
    async fn get_current_public_key(&self, agent_id: &AgentId) -> KeyLookupResult<PublicKey> {
        match self.require_active(agent_id).await {
            Ok(agent) => {
                debug!(agent_id = %agent_id, key_id = %agent.public_key.key_id_hex(), "resolved agent key");
                Ok(agent.public_key)
            },
            Err(IdentityError::Storage(e)) => Err(KeyLookupError::Unavailable(e.to_string())),
            Err(_) => Err(KeyLookupError::NotFound {
                agent_id: agent_id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ajwt_core::{Clock, ScopeSet, Timestamp};
    use ajwt_crypto::KeyPair;
    use ajwt_storage::{LogRecord, MemoryKvStore, MemoryLogStore, StorageResult};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_unix_seconds(1_700_000_000).unwrap()
        }
    }

    /// Log store whose appends fail while `fail` is set.
    #[derive(Default)]
    struct FlakyLog {
        inner: MemoryLogStore,
        fail: AtomicBool,
    }

    #[async_trait]
    impl LogStore for FlakyLog {
        async fn append(&self, stream: &str, sequence: u64, data: Vec<u8>) -> StorageResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("log offline".into()));
            }
            self.inner.append(stream, sequence, data).await
        }
        async fn read(&self, stream: &str) -> StorageResult<Vec<LogRecord>> {
            self.inner.read(stream).await
        }
        async fn last(&self, stream: &str) -> StorageResult<Option<LogRecord>> {
            self.inner.last(stream).await
        }
        async fn streams(&self) -> StorageResult<Vec<String>> {
            self.inner.streams().await
        }
    }

    fn registry_with(log: Arc<dyn LogStore>) -> AgentRegistry {
        AgentRegistry::new(Arc::new(MemoryKvStore::new()), log, Arc::new(FixedClock)).unwrap()
    }

    fn registry() -> AgentRegistry {
        registry_with(Arc::new(MemoryLogStore::new()))
    }

    fn id(s: &str) -> AgentId {
        AgentId::new(s).unwrap()
    }

    fn registration(name: &str) -> AgentRegistration {
        AgentRegistration::new(
            id(name),
            KeyPair::generate().public_key(),
            AgentChecksum::of_artifact(name.as_bytes()),
        )
        .with_scope(ScopeSet::parse("read write").unwrap())
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let reg = registry();
        let agent = reg.register(registration("a")).await.unwrap();
        assert_eq!(agent.registration_version, 1);
        assert!(agent.is_active());
        assert_eq!(reg.get(&id("a")).await.unwrap(), Some(agent.clone()));
        assert_eq!(reg.history(&id("a")).await.unwrap(), vec![agent]);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let reg = registry();
        reg.register(registration("a")).await.unwrap();
        assert!(matches!(
            reg.register(registration("a")).await,
            Err(IdentityError::DuplicateAgent { .. })
        ));
    }

    #[tokio::test]
    async fn test_revoked_id_cannot_be_reused() {
        let reg = registry();
        reg.register(registration("a")).await.unwrap();
        reg.revoke(&id("a")).await.unwrap();
        assert!(matches!(
            reg.register(registration("a")).await,
            Err(IdentityError::RevokedAgent { .. })
        ));
    }

    #[tokio::test]
    async fn test_pending_until_activated() {
        let reg = registry().with_options(RegistryOptions {
            require_activation: true,
            ..RegistryOptions::default()
        });
        reg.register(registration("a")).await.unwrap();
        assert!(matches!(
            reg.require_active(&id("a")).await,
            Err(IdentityError::AgentNotActive {
                status: AgentStatus::Pending,
                ..
            })
        ));
        assert!(reg.activate(&id("a")).await.unwrap().is_active());
        assert!(reg.require_active(&id("a")).await.is_ok());
        assert_eq!(reg.history(&id("a")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rotate_bumps_version() {
        let reg = registry();
        reg.register(registration("a")).await.unwrap();
        let new_checksum = AgentChecksum::of_artifact(b"a v2");
        let rotated = reg
            .rotate(&id("a"), Rotation::checksum(new_checksum))
            .await
            .unwrap();
        assert_eq!(rotated.registration_version, 2);
        assert!(reg.verify_checksum(&id("a"), &new_checksum).await.unwrap());
        assert!(
            !reg.verify_checksum(&id("a"), &AgentChecksum::of_artifact(b"a"))
                .await
                .unwrap()
        );
        assert!(matches!(
            reg.rotate(&id("a"), Rotation::checksum(new_checksum)).await,
            Err(IdentityError::NoChange { .. })
        ));
    }

    #[tokio::test]
    async fn test_rotate_unknown_and_revoked() {
        let reg = registry();
        let key = KeyPair::generate().public_key();
        assert!(matches!(
            reg.rotate(&id("ghost"), Rotation::key(key)).await,
            Err(IdentityError::UnknownAgent { .. })
        ));
        reg.register(registration("a")).await.unwrap();
        reg.revoke(&id("a")).await.unwrap();
        assert!(matches!(
            reg.rotate(&id("a"), Rotation::key(key)).await,
            Err(IdentityError::RevokedAgent { .. })
        ));
    }

    #[tokio::test]
    async fn test_checksum_collision_and_release() {
        let reg = registry();
        reg.register(registration("a")).await.unwrap();
        let clash = AgentRegistration {
            agent_id: id("b"),
            ..registration("a")
        };
        assert!(matches!(
            reg.register(clash.clone()).await,
            Err(IdentityError::ChecksumCollision { .. })
        ));
        assert_eq!(reg.get(&id("b")).await.unwrap(), None);

        reg.revoke(&id("a")).await.unwrap();
        assert!(reg.register(clash).await.is_ok());
    }

    #[tokio::test]
    async fn test_key_directory_reflects_live_state() {
        let reg = registry();
        let agent = reg.register(registration("a")).await.unwrap();
        assert_eq!(
            reg.get_current_public_key(&id("a")).await.unwrap(),
            agent.public_key
        );
        let new_key = KeyPair::generate().public_key();
        reg.rotate(&id("a"), Rotation::key(new_key)).await.unwrap();
        assert_eq!(reg.get_current_public_key(&id("a")).await.unwrap(), new_key);
        reg.revoke(&id("a")).await.unwrap();
        assert!(matches!(
            reg.get_current_public_key(&id("a")).await,
            Err(KeyLookupError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_history_leaves_no_partial_state() {
        let log = Arc::new(FlakyLog::default());
        let reg = registry_with(Arc::clone(&log) as Arc<dyn LogStore>);
        reg.register(registration("a")).await.unwrap();

        log.fail.store(true, Ordering::SeqCst);
        let err = reg.register(registration("b")).await.unwrap_err();
        assert!(matches!(err, IdentityError::Storage(StorageError::Unavailable(_))));
        assert_eq!(reg.get(&id("b")).await.unwrap(), None);

        let key = KeyPair::generate().public_key();
        assert!(reg.rotate(&id("a"), Rotation::key(key)).await.is_err());
        assert!(reg.revoke(&id("a")).await.is_err());
        let a = reg.get(&id("a")).await.unwrap().unwrap();
        assert_eq!(a.registration_version, 1);
        assert!(a.is_active());

        log.fail.store(false, Ordering::SeqCst);
        assert!(reg.register(registration("b")).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let reg = registry();
        reg.register(registration("b")).await.unwrap();
        reg.register(registration("a")).await.unwrap();
        let ids: Vec<String> = reg
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.agent_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_batch_registers_each_entry_independently() {
        let reg = registry();
        reg.register(registration("taken")).await.unwrap();

        let results = reg
            .register_batch(vec![
                registration("a"),
                registration("taken"),
                registration("b"),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().agent_id, id("a"));
        assert!(matches!(
            results[1],
            Err(IdentityError::DuplicateAgent { .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().agent_id, id("b"));
        assert_eq!(reg.list().await.unwrap().len(), 3);
        assert!(reg.register_batch(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_for_app_filters_by_application() {
        let reg = registry();
        let billing = AppId::new("billing").unwrap();
        let support = AppId::new("support").unwrap();
        reg.register(registration("c").with_app(billing.clone()))
            .await
            .unwrap();
        reg.register(registration("a").with_app(billing.clone()))
            .await
            .unwrap();
        reg.register(registration("b").with_app(support.clone()))
            .await
            .unwrap();
        reg.register(registration("loose")).await.unwrap();

        let ids: Vec<String> = reg
            .list_for_app(&billing)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.agent_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(reg.list_for_app(&support).await.unwrap().len(), 1);
        assert!(
            reg.list_for_app(&AppId::new("other").unwrap())
                .await
                .unwrap()
                .is_empty()
        );

        // The application survives rotation.
        let rotated = reg
            .rotate(&id("b"), Rotation::key(KeyPair::generate().public_key()))
            .await
            .unwrap();
        assert_eq!(rotated.app_id, Some(support));
    }
}
