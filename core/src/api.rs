//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `taskweave_core::api` instead of reaching into internal modules.

pub use crate::cache::{make_key, CacheKey, CacheStats, ExecutionCache};
pub use crate::config::{
    load_default, load_from_path, AppConfig, CacheConfig, LoggingConfig, OrchestratorConfig,
};
pub use crate::error::{
    CacheError, CliError, ExecutionError, OrchestratorError, PlanError, ValidationIssue,
    ValidationReport,
};
pub use crate::executor::{
    ExecutionOpts, ExecutionStrategy, ExecutionSummary, Orchestrator, OrchestratorBuilder,
    OutputRendererPlugin, Plan, PlanDocument, PlanStatus, RenderEvent, StrategyDecider, Task,
    TaskExecutor, TaskGraph, TaskResult, TaskStatus,
};
pub use crate::state::{
    HitlResponse, PauseController, PauseEvent, PauseEventKind, PauseMode, SessionRegistry,
};
