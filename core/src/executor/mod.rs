//! Plan execution: the task graph model, dependency resolution, strategy
//! selection and the orchestrator that drives a plan to completion.
//!
//! # Flow
//!
//! ```text
//! Vec<Task>
//!   ↓
//! Plan::new() → TaskGraph::from_tasks() + StrategyDecider::decide()
//!   ↓
//! TaskGraph::validate() → unknown deps, self deps, duplicates, cycles
//!   ↓
//! Orchestrator::run()
//!   loop: ready_tasks() → batch_size() → approval gate → dispatch (cache) → update
//!   ↓
//! ExecutionSummary
//! ```

mod engine;
mod graph;
mod output;
mod progress;
mod scheduler;
mod strategy;
pub mod traits;
pub mod types;

pub use engine::{Orchestrator, OrchestratorBuilder};
pub use graph::TaskGraph;
pub use output::{emit_fallback, Emitter};
pub use progress::ProgressMonitor;
pub use scheduler::execute_batch;
pub use strategy::StrategyDecider;
pub use traits::{OutputRendererPlugin, RenderEvent, TaskExecutor};
pub use types::{
    ExecutionOpts, ExecutionStrategy, ExecutionSummary, Plan, PlanDocument, PlanStatus, Task,
    TaskResult, TaskStatus,
};
