//! A-JWT Registry - registration-first agent identity.
//!
//! No agent may mint a token or receive a delegation until it holds an
//! explicit, versioned registration here. A registration binds an agent id to
//! a public key and to the checksum of the agent's code; any later change to
//! either bumps `registration_version`, and revocation is terminal.
//!
//! [`AgentManifest`] computes the code checksum deterministically from an
//! agent's id, prompt template, tools, and configuration.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod agent;
mod error;
mod manifest;
mod registry;

pub use agent::{Agent, AgentRegistration, Rotation};
pub use error::{IdentityError, IdentityResult};
pub use manifest::{AgentManifest, ToolDescriptor, canonical_json};
pub use registry::{AGENTS_NAMESPACE, AgentRegistry, CHECKSUM_INDEX_NAMESPACE, RegistryOptions};
