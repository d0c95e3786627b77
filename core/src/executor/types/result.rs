use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::plan::ExecutionStrategy;

/// Outcome of dispatching a single task
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// Task identifier
    pub task_id: String,

    /// Executor payload on success
    pub output: Option<Value>,

    /// Error message on failure
    pub error: Option<String>,

    /// Whether the payload was served from the execution cache
    pub cache_hit: bool,

    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn success(task_id: impl Into<String>, output: Value, cache_hit: bool, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            output: Some(output),
            error: None,
            cache_hit,
            duration_ms,
        }
    }

    pub fn failure(task_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            output: None,
            error: Some(error.into()),
            cache_hit: false,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Overall status of a plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Every task completed
    Completed,
    /// Some tasks failed, were rejected, or are blocked behind those
    Partial,
    /// The session did not resume before the configured timeout; the plan can be run again
    Paused,
    /// The session was cancelled
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Aggregated result of running a plan
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub run_id: String,

    pub status: PlanStatus,

    pub strategy: ExecutionStrategy,

    /// Total number of tasks in the plan
    pub total_tasks: usize,

    /// Number of tasks that reached `completed`
    pub successful: usize,

    /// Number of tasks that reached `failed`
    pub failed: usize,

    /// Tasks skipped after an approval was rejected
    pub skipped: Vec<String>,

    /// Tasks that can never become ready in this run
    pub blocked: Vec<String>,

    /// task_id -> executor payload
    pub results: HashMap<String, Value>,

    /// task_id -> error message
    pub errors: HashMap<String, String>,

    /// Per-dispatch details, including cache hits and durations
    pub task_results: HashMap<String, TaskResult>,

    /// Number of dispatch waves (one per batch, or per refill in dynamic swarm)
    pub batches: usize,

    /// Total execution duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionSummary {
    pub fn is_success(&self) -> bool {
        self.status == PlanStatus::Completed
    }

    pub fn cache_hits(&self) -> usize {
        self.task_results.values().filter(|r| r.cache_hit).count()
    }
}
