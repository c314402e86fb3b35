//! A-JWT Execution Log - the detective control.
//!
//! Token verification prevents unauthorized steps; this log proves after the
//! fact which steps ran, in what order, under which tokens. Each
//! [`ExecutionLogEntry`] carries the hash of its predecessor, so editing,
//! reordering, or deleting an entry is caught by
//! [`ExecutionLogger::verify_chain`]. A tip anchor kept outside the log
//! catches truncation.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod logger;

pub use entry::{ExecutionLogEntry, LogAnchor, compute_entry_hash};
pub use error::{LogError, LogResult};
pub use logger::{ANCHORS_NAMESPACE, ExecutionLogger, LogEntryInput, LogIssue, audit_entries};
