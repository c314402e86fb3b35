//! Possession proofs.
//!
//! A proof is a signature by the agent's current key over a canonical
//! message describing exactly one request:
//!
//! ```text
//! "ajwt-pop/v1\0" || JSON {agent, body, checksum, method, nonce, timestamp, token, url}
//! ```
//!
//! The JSON object is emitted with keys in sorted order. `body` is the hex
//! SHA-256 of the request body, `checksum` the agent's code checksum, and
//! `token` the hash of the token being presented (`null` when requesting a
//! new token).

use ajwt_core::{AgentId, Timestamp};
use ajwt_crypto::{ContentHash, KeyPair, Signature, b64url_decode, b64url_encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::context::{AgentChecksum, RequestContext};
use crate::error::{ProofError, ProofResult};

/// Prefix that separates proof signatures from every other signed structure.
const PROOF_DOMAIN: &[u8] = b"ajwt-pop/v1\0";

/// Random bytes per nonce.
pub const NONCE_LEN: usize = 16;

/// Everything a proof binds, other than its own nonce and timestamp.
///
/// The client fills this from the request it is about to send; the verifier
/// fills it from the request it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBinding {
    /// The agent proving possession.
    pub agent_id: AgentId,
    /// The agent's code checksum as the agent reports it.
    pub checksum: AgentChecksum,
    /// The request being made.
    pub context: RequestContext,
    /// Hash of the presented token, if any.
    pub token_hash: Option<ContentHash>,
}

/// Sorted-key canonical form. Field order here is the serialization order.
#[derive(Serialize)]
struct ProofMessage<'a> {
    agent: &'a str,
    body: String,
    checksum: String,
    method: &'a str,
    nonce: &'a str,
    timestamp: i64,
    token: Option<String>,
    url: &'a str,
}

/// A signed proof that the sender holds the agent's private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossessionProof {
    /// The agent claiming possession.
    pub agent_id: AgentId,
    /// Single-use random value, base64url.
    pub nonce: String,
    /// When the proof was made.
    pub timestamp: Timestamp,
    /// Hash of the token this proof accompanies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_hash: Option<ContentHash>,
    /// Signature over the canonical message.
    pub signature: Signature,
}

impl PossessionProof {
    /// Sign a proof for `binding` with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::Encoding`] if the message cannot be encoded.
    pub fn create(keypair: &KeyPair, binding: &ProofBinding, now: Timestamp) -> ProofResult<Self> {
        let mut bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::create_with_nonce(keypair, binding, b64url_encode(bytes), now)
    }

    /// Sign a proof with a caller-chosen nonce.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::Encoding`] if the message cannot be encoded.
    pub fn create_with_nonce(
        keypair: &KeyPair,
        binding: &ProofBinding,
        nonce: String,
        now: Timestamp,
    ) -> ProofResult<Self> {
        let message = signing_message(binding, &nonce, now)?;
        Ok(Self {
            agent_id: binding.agent_id.clone(),
            nonce,
            timestamp: now,
            token_hash: binding.token_hash,
            signature: keypair.sign(&message),
        })
    }

    /// Check the nonce encodes exactly [`NONCE_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidNonce`] otherwise.
    pub fn check_nonce(&self) -> ProofResult<()> {
        let decoded = b64url_decode(&self.nonce)
            .map_err(|_| ProofError::InvalidNonce("not base64url".into()))?;
        if decoded.len() != NONCE_LEN {
            return Err(ProofError::InvalidNonce(format!(
                "expected {NONCE_LEN} bytes, got {}",
                decoded.len()
            )));
        }
        Ok(())
    }
}

/// The exact bytes a proof signs.
///
/// # Errors
///
/// Returns [`ProofError::Encoding`] if JSON encoding fails.
pub fn signing_message(
    binding: &ProofBinding,
    nonce: &str,
    timestamp: Timestamp,
) -> ProofResult<Vec<u8>> {
    let message = ProofMessage {
        agent: binding.agent_id.as_str(),
        body: binding.context.body_digest().to_hex(),
        checksum: binding.checksum.to_hex(),
        method: binding.context.method(),
        nonce,
        timestamp: timestamp.unix_seconds(),
        token: binding.token_hash.map(|h| h.to_hex()),
        url: binding.context.url(),
    };
    let json = serde_json::to_vec(&message).map_err(|e| ProofError::Encoding(e.to_string()))?;
    let mut data = Vec::with_capacity(PROOF_DOMAIN.len().saturating_add(json.len()));
    data.extend_from_slice(PROOF_DOMAIN);
    data.extend_from_slice(&json);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> ProofBinding {
        ProofBinding {
            agent_id: AgentId::new("agent-a").unwrap(),
            checksum: AgentChecksum::of_artifact(b"code"),
            context: RequestContext::new("POST", "https://svc.test/run", b"{\"x\":1}").unwrap(),
            token_hash: None,
        }
    }

    #[test]
    fn test_message_keys_sorted() {
        let ts = Timestamp::from_unix_seconds(1_700_000_000).unwrap();
        let msg = signing_message(&binding(), "nonce", ts).unwrap();
        let json = std::str::from_utf8(&msg[PROOF_DOMAIN.len()..]).unwrap();
        let keys = [
            "\"agent\"",
            "\"body\"",
            "\"checksum\"",
            "\"method\"",
            "\"nonce\"",
            "\"timestamp\"",
            "\"token\"",
            "\"url\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
        assert!(json.contains("\"token\":null"));
    }

    #[test]
    fn test_create_signs_message() {
        let kp = KeyPair::generate();
        let b = binding();
        let ts = Timestamp::from_unix_seconds(1_700_000_000).unwrap();
        let proof = PossessionProof::create(&kp, &b, ts).unwrap();
        proof.check_nonce().unwrap();

        let msg = signing_message(&b, &proof.nonce, ts).unwrap();
        assert!(kp.verify(&msg, &proof.signature).is_ok());
    }

    #[test]
    fn test_fresh_nonces_differ() {
        let kp = KeyPair::generate();
        let ts = Timestamp::now();
        let a = PossessionProof::create(&kp, &binding(), ts).unwrap();
        let b = PossessionProof::create(&kp, &binding(), ts).unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_check_nonce_rejects_short() {
        let kp = KeyPair::generate();
        let proof =
            PossessionProof::create_with_nonce(&kp, &binding(), "AAAA".into(), Timestamp::now())
                .unwrap();
        assert!(matches!(
            proof.check_nonce(),
            Err(ProofError::InvalidNonce(_))
        ));
    }
}
