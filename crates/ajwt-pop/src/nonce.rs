//! Single-use nonce tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ajwt_core::{AgentId, Timestamp};
use ajwt_storage::{KvStore, ScopedKvStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProofError, ProofResult};

/// Namespace holding spent nonces.
pub const NONCES_NAMESPACE: &str = "ajwt:nonces";

/// Expired entries are swept after this many nonces have been recorded.
const PRUNE_INTERVAL: usize = 4096;

/// Stored value for a spent nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SpentNonce {
    expires_at: i64,
}

/// Records consumed nonces in a shared key-value store until they can no
/// longer pass the freshness window.
///
/// Every verifier opened over the same store sees the same nonces, so a
/// proof accepted by one process is a replay to all others.
pub struct NonceLedger {
    spent: ScopedKvStore,
    recorded: AtomicUsize,
}

impl std::fmt::Debug for NonceLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceLedger")
            .field("namespace", &self.spent.namespace())
            .finish_non_exhaustive()
    }
}

impl NonceLedger {
    /// Open the ledger over `kv`.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::NonceStore`] if the namespace is rejected.
    pub fn new(kv: Arc<dyn KvStore>) -> ProofResult<Self> {
        Ok(Self {
            spent: ScopedKvStore::new(kv, NONCES_NAMESPACE)?,
            recorded: AtomicUsize::new(0),
        })
    }

    /// Record `nonce` for `agent_id` until `expires_at`.
    ///
    /// An entry whose expiry has passed is replaced, never extended by a
    /// racing writer: the swap only lands against the exact stale value.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::NonceReplayed`] if the nonce is already recorded
    /// and not yet expired, or [`ProofError::NonceStore`] on backend failure.
    pub async fn check_and_mark(
        &self,
        agent_id: &AgentId,
        nonce: &str,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> ProofResult<()> {
        let key = key(agent_id, nonce);
        let entry = SpentNonce {
            expires_at: expires_at.unix_seconds(),
        };

        if !self.spent.insert_new_json(&key, &entry).await? {
            let stale = match self.spent.get_json::<SpentNonce>(&key).await? {
                Some(existing) if existing.expires_at <= now.unix_seconds() => existing,
                _ => return Err(ProofError::NonceReplayed),
            };
            if !self
                .spent
                .compare_and_swap_json(&key, Some(&stale), &entry)
                .await?
            {
                return Err(ProofError::NonceReplayed);
            }
        }

        let recorded = self.recorded.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if recorded.is_multiple_of(PRUNE_INTERVAL) {
            let removed = self.prune(now).await?;
            debug!(removed, "expired nonces pruned");
        }
        Ok(())
    }

    /// Whether `nonce` is currently recorded for `agent_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::NonceStore`] on backend failure.
    pub async fn is_spent(
        &self,
        agent_id: &AgentId,
        nonce: &str,
        now: Timestamp,
    ) -> ProofResult<bool> {
        Ok(self
            .spent
            .get_json::<SpentNonce>(&key(agent_id, nonce))
            .await?
            .is_some_and(|entry| entry.expires_at > now.unix_seconds()))
    }

    /// Delete entries that expired at or before `now`. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::NonceStore`] on backend failure.
    pub async fn prune(&self, now: Timestamp) -> ProofResult<usize> {
        let now = now.unix_seconds();
        let mut removed = 0usize;
        for key in self.spent.list_keys().await? {
            let expired = self
                .spent
                .get_json::<SpentNonce>(&key)
                .await?
                .is_some_and(|entry| entry.expires_at <= now);
            if expired && self.spent.delete(&key).await? {
                removed = removed.saturating_add(1);
            }
        }
        Ok(removed)
    }
}

fn key(agent_id: &AgentId, nonce: &str) -> String {
    // Nonces are base64url, so '/' cannot occur inside one.
    format!("{agent_id}/{nonce}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ajwt_storage::MemoryKvStore;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_unix_seconds(secs).unwrap()
    }

    fn ledger() -> NonceLedger {
        NonceLedger::new(Arc::new(MemoryKvStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let ledger = ledger();
        let agent = AgentId::new("a").unwrap();
        ledger.check_and_mark(&agent, "n1", ts(100), ts(160)).await.unwrap();
        assert_eq!(
            ledger.check_and_mark(&agent, "n1", ts(101), ts(161)).await,
            Err(ProofError::NonceReplayed)
        );
        assert!(ledger.is_spent(&agent, "n1", ts(101)).await.unwrap());
    }

    #[tokio::test]
    async fn test_nonces_scoped_per_agent() {
        let ledger = ledger();
        let a = AgentId::new("a").unwrap();
        let b = AgentId::new("b").unwrap();
        ledger.check_and_mark(&a, "n", ts(100), ts(160)).await.unwrap();
        assert!(ledger.check_and_mark(&b, "n", ts(100), ts(160)).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_entry_can_be_reused() {
        let ledger = ledger();
        let agent = AgentId::new("a").unwrap();
        ledger.check_and_mark(&agent, "n", ts(100), ts(110)).await.unwrap();
        assert!(!ledger.is_spent(&agent, "n", ts(110)).await.unwrap());
        ledger.check_and_mark(&agent, "n", ts(110), ts(170)).await.unwrap();
        assert_eq!(
            ledger.check_and_mark(&agent, "n", ts(111), ts(171)).await,
            Err(ProofError::NonceReplayed)
        );
    }

    #[tokio::test]
    async fn test_ledgers_share_backend() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let first = NonceLedger::new(Arc::clone(&kv)).unwrap();
        let second = NonceLedger::new(kv).unwrap();
        let agent = AgentId::new("a").unwrap();
        first.check_and_mark(&agent, "n", ts(100), ts(160)).await.unwrap();
        assert_eq!(
            second.check_and_mark(&agent, "n", ts(100), ts(160)).await,
            Err(ProofError::NonceReplayed)
        );
    }

    #[tokio::test]
    async fn test_expired_entries_pruned() {
        let ledger = ledger();
        let agent = AgentId::new("a").unwrap();
        ledger.check_and_mark(&agent, "old", ts(100), ts(110)).await.unwrap();
        ledger.check_and_mark(&agent, "new", ts(100), ts(200)).await.unwrap();
        assert_eq!(ledger.prune(ts(150)).await.unwrap(), 1);
        assert_eq!(ledger.spent.list_keys().await.unwrap().len(), 1);
        assert!(ledger.is_spent(&agent, "new", ts(150)).await.unwrap());
    }
}
