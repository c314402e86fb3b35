//! Token claims and the decoded token.

use ajwt_core::{AgentId, InstanceId, ScopeSet, StepId, Timestamp, TokenId, WorkflowId};
use ajwt_crypto::ContentHash;
use ajwt_delegation::DelegationChain;
use ajwt_pop::{AgentChecksum, PossessionProof};
use ajwt_prompt::PromptChecksum;
use serde::{Deserialize, Serialize};

use crate::wire::{TokenHeader, token_hash};

/// Confirmation claim naming the subject key the token was minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Key id of the subject's public key at mint time.
    pub kid: String,
}

/// The payload of an A-JWT.
///
/// Registered JWT claim names are used where one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentClaims {
    /// Unique token id.
    #[serde(rename = "jti")]
    pub token_id: TokenId,
    /// Issuer name.
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Intended audience.
    #[serde(rename = "aud", default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// The agent the token was minted for.
    #[serde(rename = "sub")]
    pub subject_agent_id: AgentId,
    /// Mint time.
    #[serde(rename = "iat")]
    pub issued_at: Timestamp,
    /// Expiry.
    #[serde(rename = "exp")]
    pub expires_at: Timestamp,
    /// Subject key confirmation.
    pub cnf: Confirmation,
    /// Subject code checksum at mint time.
    pub agent_checksum: AgentChecksum,
    /// Subject registration version at mint time.
    pub registration_version: u64,
    /// The chain through which the subject holds its authority.
    pub delegation_chain: DelegationChain,
    /// Workflow being executed.
    pub workflow_id: WorkflowId,
    /// Workflow version the step was validated against.
    pub workflow_version: u64,
    /// Workflow instance.
    pub instance_id: InstanceId,
    /// Step the token authorizes.
    pub step_id: StepId,
    /// Step claimed to have run before, `None` for the entry step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<StepId>,
    /// Scope granted for the step.
    pub scope: ScopeSet,
    /// Checksum of the prompt the step runs with.
    pub prompt_checksum: PromptChecksum,
    /// The subject's possession proof for the mint request.
    #[serde(rename = "pop")]
    pub proof_of_possession: PossessionProof,
}

/// A signed token together with its exact encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentToken {
    pub(crate) header: TokenHeader,
    pub(crate) claims: IntentClaims,
    pub(crate) encoded: String,
}

impl IntentToken {
    /// The header.
    #[must_use]
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// The claims.
    #[must_use]
    pub fn claims(&self) -> &IntentClaims {
        &self.claims
    }

    /// The token id.
    #[must_use]
    pub fn token_id(&self) -> TokenId {
        self.claims.token_id
    }

    /// The compact encoding.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// The compact encoding as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.encoded.as_bytes()
    }

    /// Consume into the transport bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.encoded.into_bytes()
    }

    /// Hash that presentation proofs must bind.
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        token_hash(self.as_bytes())
    }
}

impl std::fmt::Display for IntentToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded)
    }
}
