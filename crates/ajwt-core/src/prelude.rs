//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ajwt_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{Categorized, CoreError, CoreResult, ErrorCategory};

// Identifiers
pub use crate::{AgentId, AppId, InstanceId, StepId, TokenId, WorkflowId};

// Scopes and status
pub use crate::{AgentStatus, Scope, ScopeSet};

// Time
pub use crate::{Clock, SharedClock, SystemClock, Timestamp};
