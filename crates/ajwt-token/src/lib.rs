//! A-JWT Token - intent tokens bound to an agent, a delegation chain, a
//! workflow step, and a prompt.
//!
//! [`TokenEngine::mint`] issues a token only for a registered agent at the tip
//! of a valid delegation chain, for a step the workflow allows next, with a
//! possession proof over the mint request. [`TokenEngine::verify`] repeats
//! every one of those checks against live state, checks the prompt and a
//! fresh possession proof, and consumes the token so it can be used once.
//!
//! # Wire format
//!
//! See [`wire`] for the compact `header.claims.signature` encoding.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;
pub mod wire;

mod claims;
mod consumed;
mod engine;
mod error;
mod request;

pub use claims::{Confirmation, IntentClaims, IntentToken};
pub use consumed::{CONSUMED_NAMESPACE, ConsumedMark, ConsumedTokenStore};
pub use engine::{
    DEFAULT_LEEWAY_SECS, DEFAULT_TOKEN_TTL_SECS, TokenEngine, TokenOptions, VerifiedIntent,
};
pub use error::{TokenError, TokenResult};
pub use request::{MintRequest, ObservedPrompt, Presentation};
pub use wire::{MAX_TOKEN_BYTES, TokenHeader, token_hash};
