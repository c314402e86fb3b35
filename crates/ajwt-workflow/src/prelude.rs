//! Prelude module - commonly used types for convenient import.

pub use crate::{
    StepError, StepResult, ValidatedStep, WorkflowDefinition, WorkflowRegistry, WorkflowStep,
};
