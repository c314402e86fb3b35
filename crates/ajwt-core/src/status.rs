//! Agent lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a registered agent.
///
/// `Revoked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered but not yet allowed to act.
    Pending,
    /// Allowed to mint tokens and take part in delegation.
    Active,
    /// Permanently disabled.
    Revoked,
}

impl AgentStatus {
    /// Whether the agent may act.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the agent is permanently disabled.
    #[must_use]
    pub fn is_revoked(self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}
