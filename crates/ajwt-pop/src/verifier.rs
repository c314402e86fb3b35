//! Server-side possession proof verification.

use std::sync::Arc;

use ajwt_core::SharedClock;
use ajwt_crypto::PublicKey;
use ajwt_storage::KvStore;
use tracing::{debug, warn};

use crate::directory::KeyDirectory;
use crate::error::{ProofError, ProofResult};
use crate::nonce::NonceLedger;
use crate::proof::{PossessionProof, ProofBinding, signing_message};

/// Default accepted distance between a proof timestamp and the verifier clock.
pub const DEFAULT_PROOF_SKEW_SECS: i64 = 60;

/// Verifies possession proofs against live key state.
pub struct ProofVerifier {
    directory: Arc<dyn KeyDirectory>,
    nonces: NonceLedger,
    clock: SharedClock,
    max_skew_secs: i64,
}

impl std::fmt::Debug for ProofVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofVerifier")
            .field("max_skew_secs", &self.max_skew_secs)
            .field("nonces", &self.nonces)
            .finish_non_exhaustive()
    }
}

impl ProofVerifier {
    /// Create a verifier resolving keys through `directory` and recording
    /// spent nonces in `kv`.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::NonceStore`] if the nonce namespace is rejected.
    pub fn new(
        directory: Arc<dyn KeyDirectory>,
        kv: Arc<dyn KvStore>,
        clock: SharedClock,
    ) -> ProofResult<Self> {
        Ok(Self {
            directory,
            nonces: NonceLedger::new(kv)?,
            clock,
            max_skew_secs: DEFAULT_PROOF_SKEW_SECS,
        })
    }

    /// Override the accepted clock skew.
    #[must_use]
    pub fn with_max_skew_secs(mut self, secs: i64) -> Self {
        self.max_skew_secs = secs.max(0);
        self
    }

    /// The accepted clock skew in seconds.
    #[must_use]
    pub fn max_skew_secs(&self) -> i64 {
        self.max_skew_secs
    }

    /// Verify `proof` against the request the verifier observed.
    ///
    /// Checks, in order: the agent and token binding, the freshness window,
    /// the nonce format, the signature under the agent's current key, and
    /// finally consumes the nonce. A proof that fails any earlier check does
    /// not consume its nonce.
    ///
    /// Returns the key the proof verified under.
    ///
    /// # Errors
    ///
    /// Returns the [`ProofError`] for the first failed check.
    pub async fn verify(
        &self,
        proof: &PossessionProof,
        expected: &ProofBinding,
    ) -> ProofResult<PublicKey> {
        if proof.agent_id != expected.agent_id {
            return Err(ProofError::WrongAgent {
                expected: expected.agent_id.clone(),
                actual: proof.agent_id.clone(),
            });
        }
        if proof.token_hash != expected.token_hash {
            return Err(ProofError::TokenBindingMismatch);
        }

        let now = self.clock.now();
        let age_secs = now.seconds_since(&proof.timestamp);
        if age_secs.saturating_abs() > self.max_skew_secs {
            warn!(agent_id = %proof.agent_id, age_secs, "possession proof outside freshness window");
            return Err(ProofError::OutsideWindow {
                age_secs,
                max_skew_secs: self.max_skew_secs,
            });
        }
        proof.check_nonce()?;

        let key = self
            .directory
            .get_current_public_key(&proof.agent_id)
            .await?;
        let message = signing_message(expected, &proof.nonce, proof.timestamp)?;
        if key.verify(&message, &proof.signature).is_err() {
            warn!(agent_id = %proof.agent_id, "possession proof signature mismatch");
            return Err(ProofError::InvalidSignature);
        }

        // A nonce stays recorded until its proof can no longer be fresh.
        let expires_at = proof.timestamp.plus_secs(self.max_skew_secs.saturating_add(1));
        self.nonces
            .check_and_mark(&proof.agent_id, &proof.nonce, now, expires_at)
            .await?;

        debug!(agent_id = %proof.agent_id, key_id = %key.key_id_hex(), "possession proof verified");
        Ok(key)
    }
}
