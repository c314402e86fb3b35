//! Agent records.

use ajwt_core::{AgentId, AgentStatus, AppId, ScopeSet, Timestamp};
use ajwt_crypto::PublicKey;
use ajwt_pop::AgentChecksum;
use serde::{Deserialize, Serialize};

/// A registered agent, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent id.
    pub agent_id: AgentId,
    /// Current public key.
    pub public_key: PublicKey,
    /// Checksum of the agent's runtime artifact.
    pub code_checksum: AgentChecksum,
    /// Capabilities the agent holds when it is the root of a delegation chain.
    pub granted_scope: ScopeSet,
    /// Application the agent was registered under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<AppId>,
    /// Starts at 1; bumped on every key, checksum, or scope change.
    pub registration_version: u64,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// When the agent was first registered.
    pub registered_at: Timestamp,
    /// When the record last changed.
    pub updated_at: Timestamp,
}

impl Agent {
    /// Whether the agent may act.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Input to [`AgentRegistry::register`](crate::AgentRegistry::register).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRegistration {
    /// The id to register.
    pub agent_id: AgentId,
    /// The agent's public key.
    pub public_key: PublicKey,
    /// The agent's code checksum.
    pub code_checksum: AgentChecksum,
    /// Capabilities granted to the agent.
    #[serde(default)]
    pub granted_scope: ScopeSet,
    /// Application the agent belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<AppId>,
}

impl AgentRegistration {
    /// A registration with an empty scope grant.
    #[must_use]
    pub fn new(agent_id: AgentId, public_key: PublicKey, code_checksum: AgentChecksum) -> Self {
        Self {
            agent_id,
            public_key,
            code_checksum,
            granted_scope: ScopeSet::new(),
            app_id: None,
        }
    }

    /// Set the scope grant.
    #[must_use]
    pub fn with_scope(mut self, scope: ScopeSet) -> Self {
        self.granted_scope = scope;
        self
    }

    /// Register the agent under an application.
    #[must_use]
    pub fn with_app(mut self, app_id: AppId) -> Self {
        self.app_id = Some(app_id);
        self
    }
}

/// A material change to an agent. Any field left `None` is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation {
    /// New public key.
    pub public_key: Option<PublicKey>,
    /// New code checksum.
    pub code_checksum: Option<AgentChecksum>,
    /// New scope grant.
    pub granted_scope: Option<ScopeSet>,
}

impl Rotation {
    /// Rotate the key only.
    #[must_use]
    pub fn key(public_key: PublicKey) -> Self {
        Self {
            public_key: Some(public_key),
            ..Self::default()
        }
    }

    /// Update the code checksum only.
    #[must_use]
    pub fn checksum(code_checksum: AgentChecksum) -> Self {
        Self {
            code_checksum: Some(code_checksum),
            ..Self::default()
        }
    }

    /// Replace the scope grant only.
    #[must_use]
    pub fn scope(granted_scope: ScopeSet) -> Self {
        Self {
            granted_scope: Some(granted_scope),
            ..Self::default()
        }
    }

    /// Also rotate the key.
    #[must_use]
    pub fn with_key(mut self, public_key: PublicKey) -> Self {
        self.public_key = Some(public_key);
        self
    }

    /// Also update the checksum.
    #[must_use]
    pub fn with_checksum(mut self, code_checksum: AgentChecksum) -> Self {
        self.code_checksum = Some(code_checksum);
        self
    }

    /// Whether applying this to `agent` changes anything.
    #[must_use]
    pub fn changes(&self, agent: &Agent) -> bool {
        self.public_key.is_some_and(|k| k != agent.public_key)
            || self
                .code_checksum
                .is_some_and(|c| c != agent.code_checksum)
            || self
                .granted_scope
                .as_ref()
                .is_some_and(|s| *s != agent.granted_scope)
    }
}
