//! Prelude module - commonly used types for convenient import.

pub use crate::{Accepted, Authority, AuthorityError, AuthorityResult, Backends};
