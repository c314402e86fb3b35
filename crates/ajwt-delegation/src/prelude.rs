//! Prelude module - commonly used types for convenient import.

pub use crate::{
    ChainError, ChainResult, DelegationChain, DelegationEngine, DelegationLink, VerifiedChain,
};
