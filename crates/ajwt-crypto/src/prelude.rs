//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ajwt_crypto::prelude::*;` to import all essential types.

// Errors
pub use crate::{CryptoError, CryptoResult};

// Key types
pub use crate::{KeyPair, PublicKey, Signature};

// Hashing
pub use crate::{ContentHash, Sha256Digest};
