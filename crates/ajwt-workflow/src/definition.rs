//! Workflow definitions and graph checks.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ajwt_core::{AgentId, ScopeSet, StepId, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::error::{StepError, StepResult};

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step id, unique within the workflow.
    pub step_id: StepId,
    /// Steps that may immediately precede this one. Empty for the entry step.
    #[serde(default)]
    pub allowed_predecessors: BTreeSet<StepId>,
    /// Scope the acting agent must hold.
    #[serde(default)]
    pub required_scope: ScopeSet,
    /// Agents assigned to the step. Empty means any active agent.
    #[serde(default)]
    pub allowed_agents: BTreeSet<AgentId>,
}

impl WorkflowStep {
    /// A step with no predecessors, requirements, or assignments.
    #[must_use]
    pub fn new(step_id: StepId) -> Self {
        Self {
            step_id,
            allowed_predecessors: BTreeSet::new(),
            required_scope: ScopeSet::new(),
            allowed_agents: BTreeSet::new(),
        }
    }

    /// Allow `predecessor` to lead to this step.
    #[must_use]
    pub fn after(mut self, predecessor: StepId) -> Self {
        self.allowed_predecessors.insert(predecessor);
        self
    }

    /// Set the required scope.
    #[must_use]
    pub fn requires(mut self, scope: ScopeSet) -> Self {
        self.required_scope = scope;
        self
    }

    /// Assign an agent to this step.
    #[must_use]
    pub fn for_agent(mut self, agent_id: AgentId) -> Self {
        self.allowed_agents.insert(agent_id);
        self
    }

    /// Whether this is an entry step.
    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.allowed_predecessors.is_empty()
    }

    /// Whether `agent_id` may perform this step.
    #[must_use]
    pub fn allows_agent(&self, agent_id: &AgentId) -> bool {
        self.allowed_agents.is_empty() || self.allowed_agents.contains(agent_id)
    }
}

/// A versioned workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow id.
    pub workflow_id: WorkflowId,
    /// Version; each publication must be strictly greater than the last.
    pub version: u64,
    /// Steps in declaration order.
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    /// A definition with no steps yet.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, version: u64) -> Self {
        Self {
            workflow_id,
            version,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    #[must_use]
    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Look up a step.
    #[must_use]
    pub fn step(&self, step_id: &StepId) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| &s.step_id == step_id)
    }

    /// The entry step, if the definition has exactly one.
    #[must_use]
    pub fn entry_step(&self) -> Option<&WorkflowStep> {
        let mut entries = self.steps.iter().filter(|s| s.is_entry());
        match (entries.next(), entries.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        }
    }

    /// Steps that may follow `step_id`, in declaration order.
    pub fn next_steps<'a>(&'a self, step_id: &'a StepId) -> impl Iterator<Item = &'a StepId> + 'a {
        self.steps
            .iter()
            .filter(move |s| s.allowed_predecessors.contains(step_id))
            .map(|s| &s.step_id)
    }

    /// Steps with no successors.
    pub fn terminal_steps(&self) -> impl Iterator<Item = &StepId> {
        self.steps
            .iter()
            .filter(|s| self.next_steps(&s.step_id).next().is_none())
            .map(|s| &s.step_id)
    }

    /// Check that the steps form a DAG with exactly one entry step.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidGraph`] describing the first problem: no
    /// steps, duplicate ids, unknown or self predecessors, zero or several
    /// entry steps, or a cycle.
    pub fn validate(&self) -> StepResult<()> {
        let invalid = |reason: String| StepError::InvalidGraph {
            workflow_id: self.workflow_id.clone(),
            reason,
        };

        if self.steps.is_empty() {
            return Err(invalid("workflow has no steps".into()));
        }

        let mut in_degree: BTreeMap<&StepId, usize> = BTreeMap::new();
        for step in &self.steps {
            if in_degree
                .insert(&step.step_id, step.allowed_predecessors.len())
                .is_some()
            {
                return Err(invalid(format!("duplicate step {}", step.step_id)));
            }
        }
        for step in &self.steps {
            for pred in &step.allowed_predecessors {
                if pred == &step.step_id {
                    return Err(invalid(format!("step {} precedes itself", step.step_id)));
                }
                if !in_degree.contains_key(pred) {
                    return Err(invalid(format!(
                        "step {} names unknown predecessor {pred}",
                        step.step_id
                    )));
                }
            }
        }

        let entries: Vec<&StepId> = self
            .steps
            .iter()
            .filter(|s| s.is_entry())
            .map(|s| &s.step_id)
            .collect();
        if entries.len() != 1 {
            return Err(invalid(format!(
                "expected exactly one entry step, found {}",
                entries.len()
            )));
        }

        // Kahn's algorithm: a cycle leaves steps that never reach in-degree zero.
        let mut queue: VecDeque<&StepId> = entries.into_iter().collect();
        let mut visited = 0usize;
        while let Some(current) = queue.pop_front() {
            visited = visited.saturating_add(1);
            for next in self.next_steps(current) {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
        if visited != self.steps.len() {
            return Err(invalid("steps contain a cycle".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(id: &str) -> StepId {
        StepId::new(id).unwrap()
    }

    fn linear() -> WorkflowDefinition {
        WorkflowDefinition::new(WorkflowId::new("wf").unwrap(), 1)
            .with_step(WorkflowStep::new(s("start")))
            .with_step(WorkflowStep::new(s("review")).after(s("start")))
            .with_step(WorkflowStep::new(s("publish")).after(s("review")))
    }

    fn reason(def: &WorkflowDefinition) -> String {
        match def.validate() {
            Err(StepError::InvalidGraph { reason, .. }) => reason,
            other => panic!("expected InvalidGraph, got {other:?}"),
        }
    }

    #[test]
    fn test_linear_graph_valid() {
        let def = linear();
        def.validate().unwrap();
        assert_eq!(def.entry_step().unwrap().step_id, s("start"));
        assert_eq!(def.next_steps(&s("start")).collect::<Vec<_>>(), vec![&s("review")]);
        assert_eq!(def.terminal_steps().collect::<Vec<_>>(), vec![&s("publish")]);
    }

    #[test]
    fn test_diamond_valid() {
        WorkflowDefinition::new(WorkflowId::new("wf").unwrap(), 1)
            .with_step(WorkflowStep::new(s("a")))
            .with_step(WorkflowStep::new(s("b")).after(s("a")))
            .with_step(WorkflowStep::new(s("c")).after(s("a")))
            .with_step(WorkflowStep::new(s("d")).after(s("b")).after(s("c")))
            .validate()
            .unwrap();
    }

    #[test]
    fn test_cycle_rejected() {
        let def = WorkflowDefinition::new(WorkflowId::new("wf").unwrap(), 1)
            .with_step(WorkflowStep::new(s("start")))
            .with_step(WorkflowStep::new(s("a")).after(s("start")).after(s("b")))
            .with_step(WorkflowStep::new(s("b")).after(s("a")));
        assert_eq!(reason(&def), "steps contain a cycle");
    }

    #[test]
    fn test_entry_count_enforced() {
        let none = WorkflowDefinition::new(WorkflowId::new("wf").unwrap(), 1)
            .with_step(WorkflowStep::new(s("a")).after(s("b")))
            .with_step(WorkflowStep::new(s("b")).after(s("a")));
        assert!(reason(&none).contains("found 0"));

        let two = linear().with_step(WorkflowStep::new(s("other")));
        assert!(reason(&two).contains("found 2"));
        assert!(two.entry_step().is_none());
    }

    #[test]
    fn test_structural_errors() {
        let empty = WorkflowDefinition::new(WorkflowId::new("wf").unwrap(), 1);
        assert_eq!(reason(&empty), "workflow has no steps");

        let dup = linear().with_step(WorkflowStep::new(s("review")).after(s("start")));
        assert!(reason(&dup).starts_with("duplicate step"));

        let unknown = linear().with_step(WorkflowStep::new(s("x")).after(s("ghost")));
        assert!(reason(&unknown).contains("unknown predecessor"));

        let selfish = linear().with_step(WorkflowStep::new(s("x")).after(s("x")));
        assert!(reason(&selfish).contains("precedes itself"));
    }

    #[test]
    fn test_agent_assignment() {
        let open = WorkflowStep::new(s("a"));
        let agent = AgentId::new("bot").unwrap();
        assert!(open.allows_agent(&agent));
        let assigned = WorkflowStep::new(s("a")).for_agent(AgentId::new("other").unwrap());
        assert!(!assigned.allows_agent(&agent));
    }
}
