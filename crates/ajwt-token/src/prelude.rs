//! Prelude module - commonly used types for convenient import.

// Errors
pub use crate::{TokenError, TokenResult};

// Engine
pub use crate::{TokenEngine, TokenOptions, VerifiedIntent};

// Requests and tokens
pub use crate::{IntentClaims, IntentToken, MintRequest, ObservedPrompt, Presentation};
