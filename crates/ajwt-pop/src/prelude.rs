//! Prelude module - commonly used types for convenient import.

// Errors
pub use crate::{KeyLookupError, ProofError, ProofResult};

// Keys
pub use crate::{AgentKeyring, KeyDirectory};

// Proofs
pub use crate::{AgentChecksum, PossessionProof, ProofBinding, ProofVerifier, RequestContext};
