//! Chain extension and live verification.

use std::sync::Arc;

use ajwt_core::{AgentId, ScopeSet, SharedClock};
use ajwt_crypto::{ContentHash, KeyPair};
use ajwt_registry::{Agent, AgentRegistry};
use tracing::{debug, warn};

use crate::chain::{DelegationChain, DelegationLink};
use crate::error::{ChainError, ChainResult};

/// Default maximum number of links in a chain.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// A chain that passed verification against live registry state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedChain {
    /// The originating agent.
    pub root: AgentId,
    /// The agent at the end of the chain, as currently registered.
    pub tip: Agent,
    /// Scope held by the tip: the root's grant narrowed by every link.
    pub effective_scope: ScopeSet,
    /// Hash of the last link, zero for an empty chain.
    pub tip_hash: ContentHash,
    /// Number of links.
    pub depth: usize,
}

/// Builds and verifies delegation chains.
///
/// Verification never caches: every call re-reads agent status and keys
/// from the registry, so revocation and key rotation apply immediately.
#[derive(Debug)]
pub struct DelegationEngine {
    registry: Arc<AgentRegistry>,
    clock: SharedClock,
    max_depth: usize,
}

impl DelegationEngine {
    /// Create an engine backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<AgentRegistry>, clock: SharedClock) -> Self {
        Self {
            registry,
            clock,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the maximum chain depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The maximum chain depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Append a link delegating `scope` from `from` (the current tip) to `to`.
    ///
    /// The existing chain is verified first; `scope` must be a subset of
    /// what `from` holds through it.
    ///
    /// # Errors
    ///
    /// - [`ChainError::NotTip`] if `from` is not the chain tip.
    /// - [`ChainError::AgentNotActive`] if either endpoint is not active.
    /// - [`ChainError::ScopeEscalation`] if `scope` exceeds `from`'s held scope.
    /// - [`ChainError::WrongSigner`] if `signer` is not `from`'s registered key.
    /// - Any error from [`verify`](Self::verify) on the existing chain.
    pub async fn extend(
        &self,
        chain: &DelegationChain,
        from: &AgentId,
        to: &AgentId,
        scope: ScopeSet,
        signer: &KeyPair,
    ) -> ChainResult<DelegationChain> {
        if chain.tip() != from {
            return Err(ChainError::NotTip {
                tip: chain.tip().clone(),
                from: from.clone(),
            });
        }
        let depth = chain.depth().saturating_add(1);
        if depth > self.max_depth {
            return Err(ChainError::TooDeep {
                depth,
                max: self.max_depth,
            });
        }

        let held = self.verify(chain).await?;
        self.live(to).await?;

        if !scope.is_subset_of(&held.effective_scope) {
            let missing = scope.missing_from(&held.effective_scope);
            warn!(from = %from, to = %to, missing = %missing, "delegation scope escalation");
            return Err(ChainError::ScopeEscalation {
                agent_id: from.clone(),
                missing,
            });
        }
        if signer.public_key() != held.tip.public_key {
            return Err(ChainError::WrongSigner {
                agent_id: from.clone(),
            });
        }

        let link = DelegationLink::sign(
            from.clone(),
            to.clone(),
            self.clock.now(),
            scope,
            held.tip_hash,
            signer,
        );
        debug!(from = %from, to = %to, depth, "delegation chain extended");
        Ok(chain.with_link(link))
    }

    /// Verify `chain` from root to tip against current registry state.
    ///
    /// Checks that every agent on the chain is registered and active, that
    /// each link is signed by the previous holder under their currently
    /// registered key, that every `parent_link_hash` matches, and that scopes
    /// never widen.
    ///
    /// # Errors
    ///
    /// The first [`ChainError`] found; any failure rejects the whole chain.
    pub async fn verify(&self, chain: &DelegationChain) -> ChainResult<VerifiedChain> {
        if chain.depth() > self.max_depth {
            return Err(ChainError::TooDeep {
                depth: chain.depth(),
                max: self.max_depth,
            });
        }

        let mut holder = self.live(chain.root()).await?;
        let mut held = holder.granted_scope.clone();
        let mut parent = ContentHash::zero();

        for (index, link) in chain.links().iter().enumerate() {
            if link.from_agent_id != holder.agent_id {
                return Err(ChainError::Discontinuous {
                    index,
                    expected: holder.agent_id.clone(),
                    actual: link.from_agent_id.clone(),
                });
            }
            if link.parent_link_hash != parent {
                warn!(index, root = %chain.root(), "delegation chain hash link broken");
                return Err(ChainError::BrokenLink { index });
            }
            if !link.is_signed_by(&holder.public_key) {
                warn!(index, signer = %holder.agent_id, "delegation link signature invalid");
                return Err(ChainError::InvalidSignature { index });
            }
            if !link.scope.is_subset_of(&held) {
                return Err(ChainError::ScopeEscalation {
                    agent_id: holder.agent_id.clone(),
                    missing: link.scope.missing_from(&held),
                });
            }

            parent = link.link_hash();
            held = link.scope.clone();
            holder = self.live(&link.to_agent_id).await?;
        }

        Ok(VerifiedChain {
            root: chain.root().clone(),
            tip: holder,
            effective_scope: held,
            tip_hash: parent,
            depth: chain.depth(),
        })
    }

    async fn live(&self, agent_id: &AgentId) -> ChainResult<Agent> {
        self.registry
            .require_active(agent_id)
            .await
            .map_err(|e| ChainError::from_identity(agent_id, e))
    }
}
