//! A-JWT Workflow - workflow graphs and step validation.
//!
//! A [`WorkflowDefinition`] is a versioned DAG of steps with a single entry
//! step. Each step names the steps allowed to precede it and the scope an
//! agent needs to perform it. [`WorkflowRegistry`] owns the published
//! definitions and answers one question for the token engine: may this step
//! run next, given what ran before and what scope the caller holds?
//!
//! Validation is a pure lookup. Execution state (which step actually ran
//! last) lives in the execution log.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod definition;
mod error;
mod registry;
mod validate;

pub use definition::{WorkflowDefinition, WorkflowStep};
pub use error::{StepError, StepResult};
pub use registry::{
    PublicationStatus, PublishedWorkflow, ValidatedStep, WORKFLOWS_NAMESPACE, WorkflowRegistry,
};
