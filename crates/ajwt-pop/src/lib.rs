//! A-JWT PoP - key directory and proof-of-possession.
//!
//! Bearer tokens can be replayed by anyone who sees them. A-JWT tokens are
//! only honored alongside a [`PossessionProof`]: a signature by the agent's
//! *current* private key over the specific request being made (method, URL,
//! body digest, agent checksum, token hash, timestamp, and a single-use
//! nonce).
//!
//! - [`KeyDirectory`] resolves an agent's current public key. The agent
//!   registry implements it; [`TimedKeyDirectory`] bounds remote lookups.
//! - [`ProofVerifier`] checks proofs against the request the server actually
//!   observed and consumes nonces in a shared [`NonceLedger`].
//! - [`AgentKeyring`] keeps agent private keys on the client side.
//!
//! # Example
//!
//! ```
//! use ajwt_core::{AgentId, Timestamp};
//! use ajwt_crypto::KeyPair;
//! use ajwt_pop::{AgentChecksum, PossessionProof, ProofBinding, RequestContext};
//!
//! let keypair = KeyPair::generate();
//! let binding = ProofBinding {
//!     agent_id: AgentId::new("planner").unwrap(),
//!     checksum: AgentChecksum::of_artifact(b"planner build 42"),
//!     context: RequestContext::new("POST", "https://api.example.com/run", b"{}").unwrap(),
//!     token_hash: None,
//! };
//! let proof = PossessionProof::create(&keypair, &binding, Timestamp::now()).unwrap();
//! assert_eq!(proof.agent_id, binding.agent_id);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod directory;
mod error;
mod keyring;
mod nonce;
mod proof;
mod verifier;

pub use context::{AgentChecksum, RequestContext};
pub use directory::{KeyDirectory, TimedKeyDirectory};
pub use error::{KeyLookupError, KeyLookupResult, ProofError, ProofResult};
pub use keyring::AgentKeyring;
pub use nonce::{NONCES_NAMESPACE, NonceLedger};
pub use proof::{NONCE_LEN, PossessionProof, ProofBinding, signing_message};
pub use verifier::{DEFAULT_PROOF_SKEW_SECS, ProofVerifier};
