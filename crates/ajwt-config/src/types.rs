//! Configuration types.
//!
//! These types have no dependency on the protocol crates. Conversion into
//! engine options happens where the engines are built. Every section
//! implements [`Default`] with the same values as `defaults.toml`, so a bare
//! `[section]` header in a file still yields a working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token issuer identity.
    pub issuer: IssuerSection,
    /// Token lifetime policy.
    pub tokens: TokensSection,
    /// Possession proof checks.
    pub possession: PossessionSection,
    /// Delegation chain limits.
    pub delegation: DelegationSection,
    /// Agent registry policy.
    pub registry: RegistrySection,
    /// Prompt checksum policy.
    pub prompt: PromptSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// IssuerSection
// ---------------------------------------------------------------------------

/// Who issues tokens and with which key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerSection {
    /// Value of the `iss` claim.
    pub name: String,
    /// Value of the `aud` claim. When set, verification requires it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Path of the issuer's secret key. A key is created there if missing.
    /// When unset, an ephemeral key is generated at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
}

impl Default for IssuerSection {
    fn default() -> Self {
        Self {
            name: "ajwt".to_owned(),
            audience: None,
            key_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TokensSection
// ---------------------------------------------------------------------------

/// Token lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensSection {
    /// Seconds from mint to expiry.
    pub ttl_secs: u64,
    /// Tolerated clock difference for `iat`/`exp` checks.
    pub leeway_secs: u64,
}

impl Default for TokensSection {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            leeway_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// PossessionSection
// ---------------------------------------------------------------------------

/// Possession proof freshness and key lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionSection {
    /// Maximum age (either direction) of a proof timestamp.
    pub max_skew_secs: u64,
    /// Timeout for resolving an agent's current public key.
    pub key_lookup_timeout_ms: u64,
}

impl Default for PossessionSection {
    fn default() -> Self {
        Self {
            max_skew_secs: 60,
            key_lookup_timeout_ms: 2000,
        }
    }
}

// ---------------------------------------------------------------------------
// DelegationSection
// ---------------------------------------------------------------------------

/// Delegation chain limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationSection {
    /// Maximum number of links in a chain.
    pub max_depth: usize,
}

impl Default for DelegationSection {
    fn default() -> Self {
        Self { max_depth: 8 }
    }
}

// ---------------------------------------------------------------------------
// RegistrySection
// ---------------------------------------------------------------------------

/// Agent registration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// New agents start pending and need explicit activation.
    pub require_activation: bool,
    /// Refuse two live agents with the same code checksum.
    pub reject_checksum_collisions: bool,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            require_activation: false,
            reject_checksum_collisions: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PromptSection
// ---------------------------------------------------------------------------

/// Prompt checksum policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    /// Normalize whitespace before hashing prompts.
    pub normalize: bool,
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, or `"json"`.
    pub format: String,
    /// Output stream: `"stdout"` or `"stderr"`.
    pub target: String,
    /// Per-crate directives (e.g. `["ajwt_token=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directives: Vec::new(),
        }
    }
}
