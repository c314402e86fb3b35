//! Log entries and their hashes.

use ajwt_core::{StepId, TokenId};
use ajwt_crypto::{ContentHash, DOMAIN_LOG_ENTRY};
use serde::{Deserialize, Serialize};

const HASH_INPUT_VERSION: u8 = 0x01;

/// One executed workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Position in the instance's log, starting at 1.
    pub sequence_no: u64,
    /// The token that authorized the step.
    pub token_id: TokenId,
    /// The step that ran.
    pub step_id: StepId,
    /// Hash of the previous entry, zero for the first.
    pub prev_entry_hash: ContentHash,
    /// Hash over the four fields above.
    pub entry_hash: ContentHash,
}

impl ExecutionLogEntry {
    /// Build an entry, computing its hash.
    #[must_use]
    pub fn new(
        sequence_no: u64,
        token_id: TokenId,
        step_id: StepId,
        prev_entry_hash: ContentHash,
    ) -> Self {
        let entry_hash = compute_entry_hash(sequence_no, &token_id, &step_id, &prev_entry_hash);
        Self {
            sequence_no,
            token_id,
            step_id,
            prev_entry_hash,
            entry_hash,
        }
    }

    /// Recompute the hash from the entry's fields.
    #[must_use]
    pub fn recompute_hash(&self) -> ContentHash {
        compute_entry_hash(
            self.sequence_no,
            &self.token_id,
            &self.step_id,
            &self.prev_entry_hash,
        )
    }

    /// Whether the stored hash matches the fields.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.entry_hash.ct_eq(&self.recompute_hash())
    }
}

/// `hash(sequence_no, token_id, step_id, prev_entry_hash)`.
///
/// Input layout: version byte, sequence (u64 LE), token UUID (16 bytes),
/// step id length (u32 LE) and bytes, previous hash (32 bytes).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn compute_entry_hash(
    sequence_no: u64,
    token_id: &TokenId,
    step_id: &StepId,
    prev_entry_hash: &ContentHash,
) -> ContentHash {
    let step = step_id.as_str().as_bytes();
    let mut data = Vec::with_capacity(96);
    data.push(HASH_INPUT_VERSION);
    data.extend_from_slice(&sequence_no.to_le_bytes());
    data.extend_from_slice(token_id.0.as_bytes());
    data.extend_from_slice(&(step.len() as u32).to_le_bytes());
    data.extend_from_slice(step);
    data.extend_from_slice(prev_entry_hash.as_bytes());
    ContentHash::hash_with_domain(DOMAIN_LOG_ENTRY, &data)
}

/// The last known tip of an instance's log, kept apart from the log so
/// truncation is detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAnchor {
    /// Sequence number of the anchored entry.
    pub sequence_no: u64,
    /// Its hash.
    pub entry_hash: ContentHash,
}
