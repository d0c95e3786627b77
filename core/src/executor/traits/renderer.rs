use crate::executor::types::{ExecutionStrategy, ExecutionSummary, TaskResult};
use crate::state::PauseMode;

/// Output renderer plugin (controls the output format)
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn supports_streaming(&self) -> bool {
        false
    }
    fn render(&self, event: &RenderEvent);
}

/// Progress events emitted by the orchestrator during a run
#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        total_tasks: usize,
        strategy: ExecutionStrategy,
    },
    Plan {
        run_id: String,
        levels: Vec<Vec<String>>,
    },
    BatchStart {
        run_id: String,
        batch: usize,
        task_ids: Vec<String>,
    },
    TaskStart {
        run_id: String,
        task_id: String,
        batch: usize,
    },
    TaskComplete {
        run_id: String,
        result: TaskResult,
    },
    TaskSkipped {
        run_id: String,
        task_id: String,
        reason: String,
    },
    BatchEnd {
        run_id: String,
        batch: usize,
    },
    Paused {
        run_id: String,
        mode: PauseMode,
    },
    RunEnd {
        run_id: String,
        summary: ExecutionSummary,
    },
}

impl RenderEvent {
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStart { run_id, .. }
            | Self::Plan { run_id, .. }
            | Self::BatchStart { run_id, .. }
            | Self::TaskStart { run_id, .. }
            | Self::TaskComplete { run_id, .. }
            | Self::TaskSkipped { run_id, .. }
            | Self::BatchEnd { run_id, .. }
            | Self::Paused { run_id, .. }
            | Self::RunEnd { run_id, .. } => run_id,
        }
    }
}
