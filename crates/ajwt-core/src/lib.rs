//! A-JWT Core - shared types for the trust protocol crates.
//!
//! This crate provides:
//! - Validated identifiers for agents, workflows, steps, and instances
//! - Whole-second [`Timestamp`]s and an injectable [`Clock`]
//! - Capability [`Scope`]s and [`ScopeSet`]s
//! - [`AgentStatus`]
//! - The [`ErrorCategory`] taxonomy shared by every protocol error
//!
//! # Example
//!
//! ```
//! use ajwt_core::{AgentId, ScopeSet};
//!
//! let agent = AgentId::new("planner").unwrap();
//! let granted = ScopeSet::parse("read:docs write:docs").unwrap();
//! let delegated = ScopeSet::parse("read:docs").unwrap();
//! assert!(delegated.is_subset_of(&granted));
//! assert_eq!(agent.as_str(), "planner");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod ids;
mod scope;
mod status;
mod time;

pub use error::{Categorized, CoreError, CoreResult, ErrorCategory};
pub use ids::{AgentId, AppId, InstanceId, MAX_IDENTIFIER_LEN, StepId, TokenId, WorkflowId};
pub use scope::{Scope, ScopeSet};
pub use status::AgentStatus;
pub use time::{Clock, SharedClock, SystemClock, Timestamp, system_clock};
