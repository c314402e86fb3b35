//! Public key resolution.

use std::sync::Arc;
use std::time::Duration;

use ajwt_core::AgentId;
use ajwt_crypto::PublicKey;
use async_trait::async_trait;
use tracing::warn;

use crate::error::{KeyLookupError, KeyLookupResult};

/// Resolves an agent's currently registered public key.
///
/// Every signature check in the protocol goes through this trait at
/// validation time, so a rotated key takes effect immediately.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// The agent's current public key.
    async fn get_current_public_key(&self, agent_id: &AgentId) -> KeyLookupResult<PublicKey>;
}

/// Wraps a directory and bounds every lookup with a timeout.
///
/// Key lookups are the only operations in the protocol that may reach an
/// external service, so this is the only place a timeout applies.
#[derive(Clone)]
pub struct TimedKeyDirectory {
    inner: Arc<dyn KeyDirectory>,
    timeout: Duration,
}

impl std::fmt::Debug for TimedKeyDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedKeyDirectory")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TimedKeyDirectory {
    /// Wrap `inner` with `timeout`.
    #[must_use]
    pub fn new(inner: Arc<dyn KeyDirectory>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl KeyDirectory for TimedKeyDirectory {
    async fn get_current_public_key(&self, agent_id: &AgentId) -> KeyLookupResult<PublicKey> {
        match tokio::time::timeout(self.timeout, self.inner.get_current_public_key(agent_id)).await
        {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(agent_id = %agent_id, timeout_ms, "key lookup timed out");
                Err(KeyLookupError::Timeout {
                    agent_id: agent_id.clone(),
                    timeout_ms,
                })
            },
        }
    }
}
