use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, ValidationReport};
use crate::executor::graph::TaskGraph;
use crate::executor::strategy::StrategyDecider;

use super::task::{Task, TaskStatus};

/// How the orchestrator dispatches the tasks of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// Exactly one task; no orchestration needed
    Single,
    /// Never more than one task in flight
    Sequential,
    /// Ready tasks run together in batches capped by `max_parallel`
    Parallel,
    /// Like parallel, but the in-flight set is refilled on every completion
    DynamicSwarm,
}

impl ExecutionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::DynamicSwarm => "dynamic-swarm",
        }
    }

    pub fn is_concurrent(self) -> bool {
        matches!(self, Self::Parallel | Self::DynamicSwarm)
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "dynamic-swarm" | "dynamic_swarm" | "swarm" => Ok(Self::DynamicSwarm),
            other => Err(format!("unknown execution strategy: {other}")),
        }
    }
}

/// Serialized form of a plan as produced by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ExecutionStrategy>,
}

/// An ordered set of tasks plus their derived dependency graph.
///
/// The task set and dependency lists are fixed at construction; only task
/// status, result and error change while the plan executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PlanDocument", into = "PlanDocument")]
pub struct Plan {
    tasks: Vec<Task>,
    graph: TaskGraph,
    strategy: ExecutionStrategy,
}

impl Plan {
    /// Build a plan without rejecting it. Call [`Plan::validate`] before running.
    pub fn new(tasks: Vec<Task>) -> Self {
        let graph = TaskGraph::from_tasks(&tasks);
        let strategy = StrategyDecider::decide(&graph);
        Self {
            tasks,
            graph,
            strategy,
        }
    }

    /// Build a plan and reject it if its dependency graph is invalid.
    pub fn build(tasks: Vec<Task>) -> Result<Self, PlanError> {
        let plan = Self::new(tasks);
        plan.validate().into_result()?;
        Ok(plan)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: ExecutionStrategy) {
        self.strategy = strategy;
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Mutable access for status updates. Structure stays fixed because ids and
    /// dependencies are mirrored in the graph.
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// task id -> declared dependency ids
    pub fn dependency_map(&self) -> HashMap<String, Vec<String>> {
        self.graph.edges.clone()
    }

    pub fn validate(&self) -> ValidationReport {
        self.graph.validate()
    }

    pub fn has_cycle(&self) -> bool {
        self.graph.has_cycle()
    }

    pub fn topological_order(&self) -> Result<Vec<&Task>, PlanError> {
        let ids = self.graph.topological_order()?;
        Ok(self.lookup_all(&ids))
    }

    /// Pending tasks whose dependencies are all in `completed`, priority order.
    pub fn ready_tasks(&self, completed: &HashSet<String>) -> Vec<&Task> {
        let ids = self.graph.ready_tasks(&self.tasks, completed);
        self.lookup_all(&ids)
    }

    pub fn parallel_levels(&self) -> Result<Vec<Vec<&Task>>, PlanError> {
        let levels = self.graph.parallel_levels()?;
        Ok(levels.iter().map(|ids| self.lookup_all(ids)).collect())
    }

    pub fn completed_ids(&self) -> HashSet<String> {
        self.ids_with_status(TaskStatus::Completed).into_iter().collect()
    }

    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    fn lookup_all(&self, ids: &[String]) -> Vec<&Task> {
        ids.iter().filter_map(|id| self.task(id)).collect()
    }
}

impl From<PlanDocument> for Plan {
    fn from(doc: PlanDocument) -> Self {
        let mut plan = Plan::new(doc.tasks);
        if let Some(strategy) = doc.strategy {
            plan.strategy = strategy;
        }
        plan
    }
}

impl From<Plan> for PlanDocument {
    fn from(plan: Plan) -> Self {
        Self {
            tasks: plan.tasks,
            strategy: Some(plan.strategy),
        }
    }
}
