//! Single-use bookkeeping for tokens.

use std::sync::Arc;

use ajwt_core::{AgentId, Timestamp, TokenId};
use ajwt_storage::{KeyGuard, KeyedLocks, KvStore, ScopedKvStore, StorageResult};
use serde::{Deserialize, Serialize};

/// Namespace holding consumed-token marks.
pub const CONSUMED_NAMESPACE: &str = "ajwt:consumed";

/// Record that a token has been used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedMark {
    /// The token.
    pub token_id: TokenId,
    /// Its subject.
    pub subject: AgentId,
    /// When it was consumed.
    pub consumed_at: Timestamp,
}

/// Persistent set of consumed token ids.
///
/// A mark is created with insert-if-absent, so two verifiers racing on the
/// same token can never both succeed even across processes sharing a store.
pub struct ConsumedTokenStore {
    marks: ScopedKvStore,
    locks: KeyedLocks,
}

impl ConsumedTokenStore {
    /// Open the store over `kv`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the namespace is rejected.
    pub fn new(kv: Arc<dyn KvStore>) -> StorageResult<Self> {
        Ok(Self {
            marks: ScopedKvStore::new(kv, CONSUMED_NAMESPACE)?,
            locks: KeyedLocks::new(),
        })
    }

    /// Serialize work on one token within this process.
    pub async fn lock(&self, token_id: &TokenId) -> KeyGuard {
        self.locks.lock(&key(token_id)).await
    }

    /// Whether the token has been consumed.
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure.
    pub async fn is_consumed(&self, token_id: &TokenId) -> StorageResult<bool> {
        self.marks.exists(&key(token_id)).await
    }

    /// Fetch the mark for a token.
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure.
    pub async fn get(&self, token_id: &TokenId) -> StorageResult<Option<ConsumedMark>> {
        self.marks.get_json(&key(token_id)).await
    }

    /// Create the mark. Returns `false` if the token was already consumed.
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure.
    pub async fn reserve(&self, mark: &ConsumedMark) -> StorageResult<bool> {
        self.marks.insert_new_json(&key(&mark.token_id), mark).await
    }

    /// Remove a mark whose commit step failed.
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure.
    pub async fn release(&self, token_id: &TokenId) -> StorageResult<bool> {
        self.marks.delete(&key(token_id)).await
    }
}

impl std::fmt::Debug for ConsumedTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumedTokenStore")
            .field("namespace", &self.marks.namespace())
            .finish_non_exhaustive()
    }
}

fn key(token_id: &TokenId) -> String {
    token_id.0.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ajwt_storage::MemoryKvStore;

    fn mark(token_id: TokenId) -> ConsumedMark {
        ConsumedMark {
            token_id,
            subject: AgentId::new("agent-a").unwrap(),
            consumed_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_reserve_is_single_use() {
        let store = ConsumedTokenStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let id = TokenId::new();
        assert!(!store.is_consumed(&id).await.unwrap());
        assert!(store.reserve(&mark(id)).await.unwrap());
        assert!(!store.reserve(&mark(id)).await.unwrap());
        assert!(store.is_consumed(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap().unwrap().token_id, id);
    }

    #[tokio::test]
    async fn test_release_allows_retry() {
        let store = ConsumedTokenStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let id = TokenId::new();
        assert!(store.reserve(&mark(id)).await.unwrap());
        assert!(store.release(&id).await.unwrap());
        assert!(!store.is_consumed(&id).await.unwrap());
        assert!(store.reserve(&mark(id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_shared_backend_sees_marks() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let a = ConsumedTokenStore::new(Arc::clone(&kv)).unwrap();
        let b = ConsumedTokenStore::new(kv).unwrap();
        let id = TokenId::new();
        assert!(a.reserve(&mark(id)).await.unwrap());
        assert!(!b.reserve(&mark(id)).await.unwrap());
    }
}
