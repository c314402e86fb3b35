//! Prelude module - commonly used types for convenient import.

// Errors
pub use crate::{IdentityError, IdentityResult};

// Registry
pub use crate::{Agent, AgentRegistration, AgentRegistry, RegistryOptions, Rotation};

// Checksums
pub use crate::{AgentManifest, ToolDescriptor};
