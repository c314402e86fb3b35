//! Delegation links and chains.

use ajwt_core::{AgentId, ScopeSet, Timestamp};
use ajwt_crypto::{ContentHash, DOMAIN_DELEGATION_LINK, KeyPair, PublicKey, Signature};
use serde::{Deserialize, Serialize};

/// Version byte prefixed to link signing data.
const SIGNING_DATA_VERSION: u8 = 0x01;

#[allow(clippy::cast_possible_truncation)]
fn write_length_prefixed(data: &mut Vec<u8>, bytes: &[u8]) {
    // Link fields are identifiers and scope names, far below u32::MAX.
    data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    data.extend_from_slice(bytes);
}

/// One signed capability grant from one agent to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationLink {
    /// The delegating agent, who signs the link.
    pub from_agent_id: AgentId,
    /// The agent receiving the grant.
    pub to_agent_id: AgentId,
    /// When the grant was made.
    pub issued_at: Timestamp,
    /// The capabilities granted.
    pub scope: ScopeSet,
    /// Hash of the previous link, or all zeroes for the first link.
    pub parent_link_hash: ContentHash,
    /// Signature by `from_agent_id` over [`signing_data`](Self::signing_data).
    pub signature: Signature,
}

impl DelegationLink {
    /// Create and sign a link.
    #[must_use]
    pub fn sign(
        from_agent_id: AgentId,
        to_agent_id: AgentId,
        issued_at: Timestamp,
        scope: ScopeSet,
        parent_link_hash: ContentHash,
        signer: &KeyPair,
    ) -> Self {
        let mut link = Self {
            from_agent_id,
            to_agent_id,
            issued_at,
            scope,
            parent_link_hash,
            signature: Signature::empty(),
        };
        link.signature = signer.sign(&link.signing_data());
        link
    }

    /// The bytes the signature covers.
    ///
    /// Format (v1):
    /// - 1 byte: version (0x01)
    /// - Length-prefixed `from_agent_id`
    /// - Length-prefixed `to_agent_id`
    /// - 8 bytes: `issued_at` (unix seconds, i64 LE)
    /// - 4 bytes: number of scopes
    /// - For each scope, in sorted order: length-prefixed name
    /// - 32 bytes: `parent_link_hash`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(128);
        data.push(SIGNING_DATA_VERSION);
        write_length_prefixed(&mut data, self.from_agent_id.as_str().as_bytes());
        write_length_prefixed(&mut data, self.to_agent_id.as_str().as_bytes());
        data.extend_from_slice(&self.issued_at.unix_seconds().to_le_bytes());
        data.extend_from_slice(&(self.scope.len() as u32).to_le_bytes());
        for scope in &self.scope {
            write_length_prefixed(&mut data, scope.as_str().as_bytes());
        }
        data.extend_from_slice(self.parent_link_hash.as_bytes());
        data
    }

    /// Hash of this link, signature included. The next link's
    /// `parent_link_hash` must equal it.
    #[must_use]
    pub fn link_hash(&self) -> ContentHash {
        let mut data = self.signing_data();
        data.extend_from_slice(self.signature.as_bytes());
        ContentHash::hash_with_domain(DOMAIN_DELEGATION_LINK, &data)
    }

    /// Whether the signature verifies under `key`.
    #[must_use]
    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        key.verify(&self.signing_data(), &self.signature).is_ok()
    }
}

/// An ordered, hash-linked sequence of delegation links.
///
/// The chain names its root explicitly; an empty chain means the root acts
/// on its own authority. Chains are immutable: extending one produces a new
/// chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationChain {
    root: AgentId,
    #[serde(default)]
    links: Vec<DelegationLink>,
}

impl DelegationChain {
    /// A chain with no links, rooted at `root`.
    #[must_use]
    pub fn new(root: AgentId) -> Self {
        Self {
            root,
            links: Vec::new(),
        }
    }

    /// Assemble a chain from parts without checking anything.
    ///
    /// Use [`DelegationEngine::verify`](crate::DelegationEngine::verify)
    /// before trusting the result.
    #[must_use]
    pub fn from_parts(root: AgentId, links: Vec<DelegationLink>) -> Self {
        Self { root, links }
    }

    /// Split into root and links.
    #[must_use]
    pub fn into_parts(self) -> (AgentId, Vec<DelegationLink>) {
        (self.root, self.links)
    }

    /// The originating agent.
    #[must_use]
    pub fn root(&self) -> &AgentId {
        &self.root
    }

    /// The links, root first.
    #[must_use]
    pub fn links(&self) -> &[DelegationLink] {
        &self.links
    }

    /// The agent currently holding the delegated authority.
    #[must_use]
    pub fn tip(&self) -> &AgentId {
        self.links
            .last()
            .map_or(&self.root, |link| &link.to_agent_id)
    }

    /// Hash of the last link, or zero for an empty chain.
    #[must_use]
    pub fn tip_hash(&self) -> ContentHash {
        self.links
            .last()
            .map_or_else(ContentHash::zero, DelegationLink::link_hash)
    }

    /// Number of links.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain has no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Every agent on the chain, root first.
    pub fn agents(&self) -> impl Iterator<Item = &AgentId> {
        std::iter::once(&self.root).chain(self.links.iter().map(|l| &l.to_agent_id))
    }

    /// A new chain with `link` appended.
    #[must_use]
    pub(crate) fn with_link(&self, link: DelegationLink) -> Self {
        let mut links = self.links.clone();
        links.push(link);
        Self {
            root: self.root.clone(),
            links,
        }
    }
}
