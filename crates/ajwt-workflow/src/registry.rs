//! Published workflow store.

use std::sync::Arc;

use ajwt_core::{AgentId, ScopeSet, SharedClock, StepId, Timestamp, WorkflowId};
use ajwt_storage::{KeyedLocks, KvStore, LogStore, ScopedKvStore, StorageError, next_sequence};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::definition::{WorkflowDefinition, WorkflowStep};
use crate::error::{StepError, StepResult};

/// KV namespace holding the current publication of each workflow.
pub const WORKFLOWS_NAMESPACE: &str = "ajwt:workflows";

fn history_stream(workflow_id: &WorkflowId) -> String {
    format!("workflow:{workflow_id}")
}

/// Whether a publication is in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    /// Steps may be validated against it.
    Active,
    /// Deregistered; kept for audit.
    Withdrawn,
}

/// A workflow definition as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedWorkflow {
    /// The definition.
    pub definition: WorkflowDefinition,
    /// Whether it is in force.
    pub status: PublicationStatus,
    /// When this version was published.
    pub published_at: Timestamp,
}

/// A step that passed validation, with the workflow version it passed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedStep {
    /// Workflow id.
    pub workflow_id: WorkflowId,
    /// Version the step was validated against.
    pub workflow_version: u64,
    /// The step.
    pub step: WorkflowStep,
}

/// Owns workflow definitions.
///
/// Definitions are immutable once published; a change means publishing a
/// strictly greater version. Every publication and withdrawal is appended
/// to a per-workflow history stream.
pub struct WorkflowRegistry {
    workflows: ScopedKvStore,
    history: Arc<dyn LogStore>,
    locks: KeyedLocks,
    clock: SharedClock,
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("namespace", &self.workflows.namespace())
            .finish_non_exhaustive()
    }
}

impl WorkflowRegistry {
    /// Create a registry over the given backends.
    ///
    /// # Errors
    ///
    /// [`StepError::Storage`] if the backend rejects the namespace.
    pub fn new(
        kv: Arc<dyn KvStore>,
        log: Arc<dyn LogStore>,
        clock: SharedClock,
    ) -> StepResult<Self> {
        Ok(Self {
            workflows: ScopedKvStore::new(kv, WORKFLOWS_NAMESPACE)?,
            history: log,
            locks: KeyedLocks::new(),
            clock,
        })
    }

    /// Publish a definition, replacing any earlier version.
    ///
    /// # Errors
    ///
    /// - [`StepError::InvalidGraph`] if the steps are not a single-entry DAG.
    /// - [`StepError::VersionConflict`] if the version is not strictly
    ///   greater than the latest published or withdrawn one.
    pub async fn publish(&self, definition: WorkflowDefinition) -> StepResult<WorkflowDefinition> {
        definition.validate()?;
        let workflow_id = definition.workflow_id.clone();
        let _guard = self.locks.lock(workflow_id.as_str()).await;

        let current = self.record(&workflow_id).await?;
        let current_version = current.as_ref().map_or(0, |p| p.definition.version);
        if definition.version <= current_version {
            warn!(
                workflow_id = %workflow_id,
                current = current_version,
                proposed = definition.version,
                "workflow version conflict"
            );
            return Err(StepError::VersionConflict {
                workflow_id,
                current: current_version,
                proposed: definition.version,
            });
        }

        let next = PublishedWorkflow {
            definition,
            status: PublicationStatus::Active,
            published_at: self.clock.now(),
        };
        self.commit(current.as_ref(), &next).await?;
        info!(
            workflow_id = %workflow_id,
            version = next.definition.version,
            steps = next.definition.steps.len(),
            "workflow published"
        );
        Ok(next.definition)
    }

    /// Withdraw a workflow. Steps no longer validate against it.
    ///
    /// # Errors
    ///
    /// [`StepError::UnknownWorkflow`] if it is not currently published.
    pub async fn deregister(&self, workflow_id: &WorkflowId) -> StepResult<PublishedWorkflow> {
        let _guard = self.locks.lock(workflow_id.as_str()).await;
        let current = self
            .record(workflow_id)
            .await?
            .filter(|p| p.status == PublicationStatus::Active)
            .ok_or_else(|| StepError::UnknownWorkflow {
                workflow_id: workflow_id.clone(),
            })?;
        let next = PublishedWorkflow {
            status: PublicationStatus::Withdrawn,
            ..current.clone()
        };
        self.commit(Some(&current), &next).await?;
        info!(workflow_id = %workflow_id, version = next.definition.version, "workflow withdrawn");
        Ok(next)
    }

    /// The stored publication, active or withdrawn.
    ///
    /// # Errors
    ///
    /// [`StepError::Storage`] on backend failure.
    pub async fn record(&self, workflow_id: &WorkflowId) -> StepResult<Option<PublishedWorkflow>> {
        Ok(self.workflows.get_json(workflow_id.as_str()).await?)
    }

    /// The definition currently in force.
    ///
    /// # Errors
    ///
    /// [`StepError::UnknownWorkflow`] if none is published.
    pub async fn current(&self, workflow_id: &WorkflowId) -> StepResult<WorkflowDefinition> {
        self.record(workflow_id)
            .await?
            .filter(|p| p.status == PublicationStatus::Active)
            .map(|p| p.definition)
            .ok_or_else(|| StepError::UnknownWorkflow {
                workflow_id: workflow_id.clone(),
            })
    }

    /// All definitions currently in force, sorted by id.
    ///
    /// # Errors
    ///
    /// [`StepError::Storage`] on backend failure.
    pub async fn list(&self) -> StepResult<Vec<WorkflowDefinition>> {
        let mut out = Vec::new();
        for key in self.workflows.list_keys().await? {
            if let Some(p) = self.workflows.get_json::<PublishedWorkflow>(&key).await?
                && p.status == PublicationStatus::Active
            {
                out.push(p.definition);
            }
        }
        Ok(out)
    }

    /// Every publication and withdrawal, oldest first.
    ///
    /// # Errors
    ///
    /// [`StepError::Storage`] on backend failure or a corrupt entry.
    pub async fn history(&self, workflow_id: &WorkflowId) -> StepResult<Vec<PublishedWorkflow>> {
        self.history
            .read(&history_stream(workflow_id))
            .await?
            .into_iter()
            .map(|record| {
                serde_json::from_slice::<PublishedWorkflow>(&record.data)
                    .map_err(|e| StepError::from(StorageError::Serialization(e.to_string())))
            })
            .collect()
    }

    /// Validate a step against the definition currently in force.
    ///
    /// # Errors
    ///
    /// [`StepError::UnknownWorkflow`], or any error of
    /// [`WorkflowDefinition::validate_step`].
    pub async fn validate_step(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        chain_scope: &ScopeSet,
        claimed_predecessor: Option<&StepId>,
    ) -> StepResult<ValidatedStep> {
        let definition = self.current(workflow_id).await?;
        let step = definition
            .validate_step(step_id, chain_scope, claimed_predecessor)?
            .clone();
        Ok(ValidatedStep {
            workflow_id: workflow_id.clone(),
            workflow_version: definition.version,
            step,
        })
    }

    /// Check that `agent_id` is assigned to a step of the current definition.
    ///
    /// # Errors
    ///
    /// [`StepError::UnknownWorkflow`], [`StepError::UnknownStep`], or
    /// [`StepError::AgentNotAllowed`].
    pub async fn authorize_agent(
        &self,
        workflow_id: &WorkflowId,
        step_id: &StepId,
        agent_id: &AgentId,
    ) -> StepResult<()> {
        self.current(workflow_id)
            .await?
            .authorize_agent(step_id, agent_id)
    }

    /// Swap the stored publication and append it to history, restoring the
    /// previous publication if the history append fails.
    async fn commit(
        &self,
        expected: Option<&PublishedWorkflow>,
        next: &PublishedWorkflow,
    ) -> StepResult<()> {
        let key = next.definition.workflow_id.as_str();
        if !self
            .workflows
            .compare_and_swap_json(key, expected, next)
            .await?
        {
            return Err(StorageError::Unavailable(format!(
                "workflow {key} modified concurrently"
            ))
            .into());
        }

        if let Err(e) = self.append_history(next).await {
            let undo = match expected {
                Some(previous) => self
                    .workflows
                    .compare_and_swap_json(key, Some(next), previous)
                    .await
                    .map(|_| ()),
                None => self.workflows.delete(key).await.map(|_| ()),
            };
            if let Err(undo) = undo {
                warn!(workflow_id = %key, error = %undo, "failed to restore workflow record");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn append_history(&self, published: &PublishedWorkflow) -> StepResult<()> {
        let stream = history_stream(&published.definition.workflow_id);
        let last = self.history.last(&stream).await?;
        let data = serde_json::to_vec(published)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.history
            .append(&stream, next_sequence(last.as_ref()), data)
            .await?;
        Ok(())
    }
}
