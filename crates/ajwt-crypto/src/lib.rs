//! A-JWT Crypto - cryptographic primitives for the trust protocol.
//!
//! This crate provides:
//! - Ed25519 key pairs, public keys, and signatures
//! - Domain-separated BLAKE3 content hashes for hash-linked structures
//! - SHA-256 digests with constant-time equality for checksums
//! - Unpadded base64url helpers for the token wire format
//!
//! # Example
//!
//! ```
//! use ajwt_crypto::{ContentHash, KeyPair, Sha256Digest, DOMAIN_DELEGATION_LINK};
//!
//! let keypair = KeyPair::generate();
//! let signature = keypair.sign(b"link bytes");
//! assert!(keypair.public_key().verify(b"link bytes", &signature).is_ok());
//!
//! let link_hash = ContentHash::hash_with_domain(DOMAIN_DELEGATION_LINK, b"link bytes");
//! assert!(!link_hash.is_zero());
//!
//! let checksum = Sha256Digest::digest(b"agent artifact");
//! assert_eq!(checksum.to_hex().len(), 64);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod digest;
mod encoding;
mod error;
mod hash;
mod keypair;
mod signature;

pub use digest::Sha256Digest;
pub use encoding::{b64url_decode, b64url_encode};
pub use error::{CryptoError, CryptoResult};
pub use hash::{ContentHash, DOMAIN_DELEGATION_LINK, DOMAIN_LOG_ENTRY, DOMAIN_TOKEN};
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
