//! A-JWT Delegation - signed, hash-linked capability chains.
//!
//! A [`DelegationChain`] records how authority flowed from a root agent to
//! the agent now acting. Each [`DelegationLink`] is signed by the delegating
//! agent and carries the hash of the link before it, so removing, reordering,
//! or editing any link breaks the chain. Scopes can only narrow along a
//! chain.
//!
//! [`DelegationEngine`] extends chains and verifies them against the live
//! agent registry. There is no partial trust: one bad link rejects the
//! whole chain.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod chain;
mod engine;
mod error;

pub use chain::{DelegationChain, DelegationLink};
pub use engine::{DEFAULT_MAX_DEPTH, DelegationEngine, VerifiedChain};
pub use error::{ChainError, ChainResult};
