use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{make_key, ExecutionCache};
use crate::error::OrchestratorError;
use crate::state::{HitlResponse, PauseController};

use super::output::Emitter;
use super::progress::ProgressMonitor;
use super::scheduler::execute_batch;
use super::strategy::StrategyDecider;
use super::traits::{OutputRendererPlugin, RenderEvent, TaskExecutor};
use super::types::{
    ExecutionOpts, ExecutionStrategy, ExecutionSummary, Plan, PlanStatus, Task, TaskResult,
    TaskStatus,
};

/// Drives a validated [`Plan`] to completion against a [`TaskExecutor`].
///
/// Each tick computes the ready set, asks the [`StrategyDecider`] how many to
/// dispatch, gates approval-required tasks through the session's
/// [`PauseController`] and dispatches the rest, through the
/// [`ExecutionCache`] when enabled. New work is never dispatched while the
/// controller is not running.
pub struct Orchestrator {
    executor: Arc<dyn TaskExecutor>,
    cache: Option<Arc<ExecutionCache>>,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    opts: ExecutionOpts,
}

pub struct OrchestratorBuilder {
    executor: Arc<dyn TaskExecutor>,
    cache: Option<Arc<ExecutionCache>>,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    opts: ExecutionOpts,
}

/// How a dispatch loop ended
enum LoopExit {
    Drained,
    Paused,
    Cancelled,
}

/// Result of asking for approval on a task
enum Gate {
    Dispatch,
    Skipped,
    /// The session left `running` before the request could be made
    Interrupted,
    /// Nobody answered within the resume timeout
    TimedOut,
}

/// Mutable bookkeeping for one call to [`Orchestrator::run`]
struct RunState {
    run_id: String,
    strategy: ExecutionStrategy,
    task_results: HashMap<String, TaskResult>,
    approved: HashSet<String>,
    batches: usize,
    progress: ProgressMonitor,
}

/// Everything a single dispatch needs; cheap to clone into spawned tasks.
#[derive(Clone)]
struct Dispatcher {
    executor: Arc<dyn TaskExecutor>,
    cache: Option<Arc<ExecutionCache>>,
    cache_ttl: Duration,
    emitter: Emitter,
    run_id: String,
}

impl Orchestrator {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self::builder(executor).build()
    }

    pub fn builder(executor: Arc<dyn TaskExecutor>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(executor)
    }

    pub fn opts(&self) -> &ExecutionOpts {
        &self.opts
    }

    pub fn cache(&self) -> Option<&Arc<ExecutionCache>> {
        self.cache.as_ref()
    }

    /// Run `plan` until no more progress is possible, the session is
    /// cancelled, or a pause outlasts `resume_timeout`.
    ///
    /// Task statuses are written back into `plan`, so a run that ended
    /// `Paused` can be continued by calling `run` again with the same plan.
    pub async fn run(
        &self,
        plan: &mut Plan,
        controller: &PauseController,
    ) -> Result<ExecutionSummary, OrchestratorError> {
        let report = plan.validate();
        if !report.is_ok() {
            tracing::warn!(issues = %report, "refusing to run invalid plan");
            return Err(OrchestratorError::InvalidPlan(report));
        }

        let run_id = self
            .opts
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let strategy = self.opts.strategy.unwrap_or(plan.strategy());

        let span = tracing::info_span!(
            "orchestrator.run",
            run_id = %run_id,
            session_id = %controller.session_id(),
            total_tasks = plan.len(),
            strategy = %strategy
        );

        self.run_validated(plan, controller, run_id, strategy)
            .instrument(span)
            .await
    }

    async fn run_validated(
        &self,
        plan: &mut Plan,
        controller: &PauseController,
        run_id: String,
        strategy: ExecutionStrategy,
    ) -> Result<ExecutionSummary, OrchestratorError> {
        let started = Instant::now();
        let levels = plan.graph().parallel_levels()?;
        let emitter = Emitter::new(self.renderer.clone());

        emitter.emit(RenderEvent::RunStart {
            run_id: run_id.clone(),
            total_tasks: plan.len(),
            strategy,
        });
        emitter.emit(RenderEvent::Plan {
            run_id: run_id.clone(),
            levels,
        });

        let progress = ProgressMonitor::new(plan.len(), self.opts.progress_bar);
        progress.skip(plan.tasks().iter().filter(|t| t.status.is_terminal()).count());

        let mut run = RunState {
            run_id: run_id.clone(),
            strategy,
            task_results: HashMap::new(),
            approved: HashSet::new(),
            batches: 0,
            progress,
        };
        let dispatcher = Dispatcher {
            executor: self.executor.clone(),
            cache: self.cache.clone().filter(|_| self.opts.use_cache),
            cache_ttl: self.opts.cache_ttl,
            emitter: emitter.clone(),
            run_id: run_id.clone(),
        };

        let exit = match strategy {
            ExecutionStrategy::DynamicSwarm => {
                self.run_dynamic(plan, controller, &dispatcher, &mut run).await
            }
            _ => self.run_batched(plan, controller, &dispatcher, &mut run).await,
        };

        let status = match exit {
            LoopExit::Drained => {
                self.block_unreachable(plan, &mut run);
                if plan.count_status(TaskStatus::Failed) == 0
                    && plan.count_status(TaskStatus::Skipped) == 0
                    && plan.count_status(TaskStatus::Blocked) == 0
                {
                    PlanStatus::Completed
                } else {
                    PlanStatus::Partial
                }
            }
            LoopExit::Paused => PlanStatus::Paused,
            LoopExit::Cancelled => {
                self.cancel_remaining(plan, &mut run);
                PlanStatus::Cancelled
            }
        };

        let summary = summarize(plan, status, run, started.elapsed());
        emitter.emit(RenderEvent::RunEnd {
            run_id,
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Fixed batches: every batch is fully awaited before the next tick.
    async fn run_batched(
        &self,
        plan: &mut Plan,
        controller: &PauseController,
        dispatcher: &Dispatcher,
        run: &mut RunState,
    ) -> LoopExit {
        loop {
            if controller.is_cancelled() {
                return LoopExit::Cancelled;
            }
            if !controller.is_running() {
                if let Some(exit) = self.wait_while_paused(controller, dispatcher, run).await {
                    return exit;
                }
                continue;
            }

            let ready = ready_ids(plan);
            if ready.is_empty() {
                return LoopExit::Drained;
            }

            let size = StrategyDecider::batch_size(run.strategy, ready.len(), self.opts.max_parallel);
            let mut selected = Vec::with_capacity(size);
            let mut interrupted = false;
            for task_id in ready.into_iter().take(size) {
                match self.gate(plan, controller, dispatcher, run, &task_id).await {
                    Gate::Dispatch => selected.push(task_id),
                    Gate::Skipped => {}
                    Gate::Interrupted => {
                        interrupted = true;
                        break;
                    }
                    Gate::TimedOut => return LoopExit::Paused,
                }
            }
            if interrupted || selected.is_empty() {
                continue;
            }

            run.batches += 1;
            let batch = run.batches;
            let tasks = start_tasks(plan, &selected, run);
            dispatcher.emitter.emit(RenderEvent::BatchStart {
                run_id: run.run_id.clone(),
                batch,
                task_ids: selected,
            });
            run.progress.update_batch(batch, tasks.len());

            let results = execute_batch(tasks, self.opts.max_parallel, |task| {
                dispatcher.dispatch(task, batch)
            })
            .await;
            for result in results {
                apply_result(plan, run, result);
            }

            dispatcher.emitter.emit(RenderEvent::BatchEnd {
                run_id: run.run_id.clone(),
                batch,
            });
        }
    }

    /// Continuous refill: every completion re-evaluates the ready set and
    /// tops the in-flight set back up to `max_parallel`.
    async fn run_dynamic(
        &self,
        plan: &mut Plan,
        controller: &PauseController,
        dispatcher: &Dispatcher,
        run: &mut RunState,
    ) -> LoopExit {
        let limit = self.opts.max_parallel.max(1);
        let mut in_flight: JoinSet<TaskResult> = JoinSet::new();

        loop {
            if controller.is_cancelled() {
                drain(&mut in_flight, plan, run).await;
                return LoopExit::Cancelled;
            }

            let mut ready_left = false;
            if controller.is_running() {
                let ready = ready_ids(plan);
                ready_left = !ready.is_empty();
                let room = limit.saturating_sub(in_flight.len());

                let mut wave = Vec::new();
                for task_id in ready.into_iter().take(room) {
                    match self.gate(plan, controller, dispatcher, run, &task_id).await {
                        Gate::Dispatch => wave.push(task_id),
                        Gate::Skipped => {}
                        Gate::Interrupted => break,
                        Gate::TimedOut => {
                            drain(&mut in_flight, plan, run).await;
                            return LoopExit::Paused;
                        }
                    }
                }

                if !wave.is_empty() {
                    run.batches += 1;
                    let batch = run.batches;
                    let tasks = start_tasks(plan, &wave, run);
                    dispatcher.emitter.emit(RenderEvent::BatchStart {
                        run_id: run.run_id.clone(),
                        batch,
                        task_ids: wave,
                    });

                    for task in tasks {
                        let dispatcher = dispatcher.clone();
                        let task_id = task.id.clone();
                        in_flight.spawn(async move {
                            AssertUnwindSafe(dispatcher.dispatch(task, batch))
                                .catch_unwind()
                                .await
                                .unwrap_or_else(|_| {
                                    TaskResult::failure(task_id, "executor panicked", 0)
                                })
                        });
                    }
                }
            }

            if in_flight.is_empty() {
                if controller.is_cancelled() {
                    continue;
                }
                if !controller.is_running() {
                    if let Some(exit) = self.wait_while_paused(controller, dispatcher, run).await {
                        return exit;
                    }
                    continue;
                }
                if !ready_left {
                    return LoopExit::Drained;
                }
                // every ready task was skipped; look again
                continue;
            }

            match in_flight.join_next().await {
                Some(Ok(result)) => apply_result(plan, run, result),
                Some(Err(e)) => tracing::error!(error = %e, "dispatch task aborted"),
                None => {}
            }
        }
    }

    /// Block until the controller resumes. `None` means keep going.
    async fn wait_while_paused(
        &self,
        controller: &PauseController,
        dispatcher: &Dispatcher,
        run: &RunState,
    ) -> Option<LoopExit> {
        dispatcher.emitter.emit(RenderEvent::Paused {
            run_id: run.run_id.clone(),
            mode: controller.mode(),
        });
        run.progress.set_message("Paused");

        if controller.wait_for_resume(self.opts.resume_timeout).await {
            tracing::info!(run_id = %run.run_id, "run resumed");
            run.progress.set_message("Resumed");
            return None;
        }
        if controller.is_cancelled() {
            return Some(LoopExit::Cancelled);
        }
        tracing::info!(run_id = %run.run_id, "resume timed out; leaving plan paused");
        Some(LoopExit::Paused)
    }

    /// Ask the session for approval when the task requires it.
    async fn gate(
        &self,
        plan: &mut Plan,
        controller: &PauseController,
        dispatcher: &Dispatcher,
        run: &mut RunState,
        task_id: &str,
    ) -> Gate {
        let message = match plan.task(task_id) {
            Some(task) if task.requires_approval && !run.approved.contains(task_id) => {
                approval_message(task)
            }
            Some(_) => return Gate::Dispatch,
            None => return Gate::Skipped,
        };

        set_status(plan, task_id, TaskStatus::NeedsApproval);
        if !controller.request_approval(task_id, message) {
            tracing::debug!(task_id = %task_id, "approval request refused; session not running");
            set_status(plan, task_id, TaskStatus::Pending);
            return Gate::Interrupted;
        }

        tracing::info!(task_id = %task_id, "waiting for approval");
        if !controller.wait_for_resume(self.opts.resume_timeout).await {
            set_status(plan, task_id, TaskStatus::Pending);
            if controller.is_cancelled() {
                return Gate::Interrupted;
            }
            tracing::info!(task_id = %task_id, "approval timed out; leaving plan paused");
            return Gate::TimedOut;
        }

        match controller.take_response() {
            Some(HitlResponse::Rejected { comment }) => {
                let reason = comment.unwrap_or_else(|| "rejected by reviewer".to_string());
                if let Some(task) = plan.task_mut(task_id) {
                    task.status = TaskStatus::Skipped;
                    task.error = Some(reason.clone());
                }
                tracing::info!(task_id = %task_id, reason = %reason, "task rejected");
                run.progress.drop_task(task_id, "rejected");
                dispatcher.emitter.emit(RenderEvent::TaskSkipped {
                    run_id: run.run_id.clone(),
                    task_id: task_id.to_string(),
                    reason,
                });
                Gate::Skipped
            }
            Some(HitlResponse::Modified { instruction, .. }) => {
                if let Some(task) = plan.task_mut(task_id) {
                    task.params
                        .insert("instruction".to_string(), Value::String(instruction));
                    task.status = TaskStatus::Pending;
                }
                tracing::info!(task_id = %task_id, "task approved with modification");
                run.approved.insert(task_id.to_string());
                Gate::Dispatch
            }
            _ => {
                set_status(plan, task_id, TaskStatus::Pending);
                tracing::info!(task_id = %task_id, "task approved");
                run.approved.insert(task_id.to_string());
                Gate::Dispatch
            }
        }
    }

    /// Pending tasks left after the ready set drained can never run.
    fn block_unreachable(&self, plan: &mut Plan, run: &mut RunState) {
        for task_id in plan.ids_with_status(TaskStatus::Pending) {
            tracing::warn!(task_id = %task_id, "task blocked by unfinished dependencies");
            set_status(plan, &task_id, TaskStatus::Blocked);
            run.progress.drop_task(&task_id, "blocked");
        }
    }

    fn cancel_remaining(&self, plan: &mut Plan, run: &mut RunState) {
        let mut remaining = plan.ids_with_status(TaskStatus::Pending);
        remaining.extend(plan.ids_with_status(TaskStatus::NeedsApproval));
        for task_id in remaining {
            set_status(plan, &task_id, TaskStatus::Cancelled);
            run.progress.drop_task(&task_id, "cancelled");
        }
    }
}

impl Dispatcher {
    async fn dispatch(&self, task: Task, batch: usize) -> TaskResult {
        self.emitter.emit(RenderEvent::TaskStart {
            run_id: self.run_id.clone(),
            task_id: task.id.clone(),
            batch,
        });

        let started = Instant::now();
        let outcome = match &self.cache {
            Some(cache) => match make_key(&task.tool, &task.params) {
                Ok(key) => {
                    cache
                        .get_or_try_execute(&key, self.cache_ttl, || self.executor.execute(&task))
                        .await
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "cache key unavailable, executing directly");
                    self.executor.execute(&task).await.map(|v| (v, false))
                }
            },
            None => self.executor.execute(&task).await.map(|v| (v, false)),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok((output, cache_hit)) => TaskResult::success(&task.id, output, cache_hit, duration_ms),
            Err(e) => TaskResult::failure(&task.id, e.to_string(), duration_ms),
        };

        self.emitter.emit(RenderEvent::TaskComplete {
            run_id: self.run_id.clone(),
            result: result.clone(),
        });
        result
    }
}

impl OrchestratorBuilder {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            cache: None,
            renderer: None,
            opts: ExecutionOpts::default(),
        }
    }

    pub fn cache(mut self, cache: Arc<ExecutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn opts(mut self, opts: ExecutionOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            executor: self.executor,
            cache: self.cache,
            renderer: self.renderer,
            opts: self.opts,
        }
    }
}

fn ready_ids(plan: &Plan) -> Vec<String> {
    let completed = plan.completed_ids();
    plan.ready_tasks(&completed)
        .into_iter()
        .map(|t| t.id.clone())
        .collect()
}

fn set_status(plan: &mut Plan, task_id: &str, status: TaskStatus) {
    if let Some(task) = plan.task_mut(task_id) {
        task.status = status;
    }
}

/// Mark `ids` in progress and hand back snapshots for dispatch.
fn start_tasks(plan: &mut Plan, ids: &[String], run: &mut RunState) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(task) = plan.task_mut(id) {
            task.mark_in_progress();
            tasks.push(task.clone());
            run.progress.add_task(id);
        }
    }
    tasks
}

fn apply_result(plan: &mut Plan, run: &mut RunState, result: TaskResult) {
    if let Some(task) = plan.task_mut(&result.task_id) {
        match (&result.output, &result.error) {
            (_, Some(error)) => task.mark_failed(error.clone()),
            (Some(output), None) => task.mark_completed(output.clone()),
            (None, None) => task.mark_completed(Value::Null),
        }
    }

    if result.is_success() {
        tracing::info!(
            task_id = %result.task_id,
            cache_hit = result.cache_hit,
            duration_ms = result.duration_ms,
            "task completed"
        );
    } else {
        tracing::warn!(
            task_id = %result.task_id,
            error = result.error.as_deref().unwrap_or_default(),
            "task failed"
        );
    }

    run.progress.complete_task(
        &result.task_id,
        result.is_success(),
        result.cache_hit,
        result.duration_ms,
    );
    run.task_results.insert(result.task_id.clone(), result);
}

async fn drain(in_flight: &mut JoinSet<TaskResult>, plan: &mut Plan, run: &mut RunState) {
    while let Some(joined) = in_flight.join_next().await {
        match joined {
            Ok(result) => apply_result(plan, run, result),
            Err(e) => tracing::error!(error = %e, "dispatch task aborted"),
        }
    }
}

fn approval_message(task: &Task) -> String {
    if task.description.is_empty() {
        format!("Approve task '{}' ({})?", task.id, task.tool)
    } else {
        format!("Approve task '{}' ({}): {}?", task.id, task.tool, task.description)
    }
}

fn summarize(plan: &Plan, status: PlanStatus, run: RunState, elapsed: Duration) -> ExecutionSummary {
    let mut results = HashMap::new();
    let mut errors = HashMap::new();
    for task in plan.tasks() {
        match task.status {
            TaskStatus::Completed => {
                results.insert(task.id.clone(), task.result.clone().unwrap_or(Value::Null));
            }
            TaskStatus::Failed => {
                errors.insert(task.id.clone(), task.error.clone().unwrap_or_default());
            }
            _ => {}
        }
    }

    run.progress.finish(status == PlanStatus::Completed);

    ExecutionSummary {
        run_id: run.run_id,
        status,
        strategy: run.strategy,
        total_tasks: plan.len(),
        successful: plan.count_status(TaskStatus::Completed),
        failed: plan.count_status(TaskStatus::Failed),
        skipped: plan.ids_with_status(TaskStatus::Skipped),
        blocked: plan.ids_with_status(TaskStatus::Blocked),
        results,
        errors,
        task_results: run.task_results,
        batches: run.batches,
        duration_ms: elapsed.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Echoes params; fails tools named "fail"; records start order.
    #[derive(Default)]
    struct Echo {
        started: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskExecutor for Echo {
        async fn execute(&self, task: &Task) -> Result<Value, ExecutionError> {
            self.started.lock().unwrap().push(task.id.clone());
            tokio::time::sleep(Duration::from_millis(5)).await;
            if task.tool == "fail" {
                return Err(ExecutionError::failed(format!("{} exploded", task.id)));
            }
            Ok(Value::Object(task.params.clone()))
        }
    }

    fn orchestrator(executor: Arc<Echo>, opts: ExecutionOpts) -> Orchestrator {
        Orchestrator::builder(executor).opts(opts).build()
    }

    #[tokio::test]
    async fn test_sequential_plan_completes_in_order() {
        let echo = Arc::new(Echo::default());
        let mut plan = Plan::new(vec![
            Task::new("a", "echo"),
            Task::new("b", "echo").with_dependencies(["a"]),
            Task::new("c", "echo").with_dependencies(["b"]),
        ]);
        let ctl = PauseController::new("s");

        let summary = orchestrator(echo.clone(), ExecutionOpts::default())
            .run(&mut plan, &ctl)
            .await
            .unwrap();

        assert_eq!(summary.status, PlanStatus::Completed);
        assert_eq!(summary.strategy, ExecutionStrategy::Sequential);
        assert_eq!(summary.batches, 3);
        assert_eq!(*echo.started.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failure_blocks_only_dependents() {
        let echo = Arc::new(Echo::default());
        let mut plan = Plan::new(vec![
            Task::new("bad", "fail"),
            Task::new("ok", "echo"),
            Task::new("after_bad", "echo").with_dependencies(["bad"]),
            Task::new("after_ok", "echo").with_dependencies(["ok"]),
        ]);
        let ctl = PauseController::new("s");

        let summary = orchestrator(echo, ExecutionOpts::default())
            .run(&mut plan, &ctl)
            .await
            .unwrap();

        assert_eq!(summary.status, PlanStatus::Partial);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.blocked, vec!["after_bad".to_string()]);
        assert_eq!(summary.errors["bad"], "Task execution failed: bad exploded");
        assert_eq!(plan.task("after_ok").unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_invalid_plan_is_refused() {
        let echo = Arc::new(Echo::default());
        let mut plan = Plan::new(vec![Task::new("a", "echo").with_dependencies(["a"])]);
        let ctl = PauseController::new("s");

        let err = orchestrator(echo.clone(), ExecutionOpts::default())
            .run(&mut plan, &ctl)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidPlan(_)));
        assert!(echo.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_tool_calls() {
        let echo = Arc::new(Echo::default());
        let cache = Arc::new(ExecutionCache::new(10, Duration::from_secs(60)));
        let orch = Orchestrator::builder(echo.clone())
            .cache(cache.clone())
            .opts(ExecutionOpts::default().with_strategy(ExecutionStrategy::Sequential))
            .build();

        let mut plan = Plan::new(vec![
            Task::new("first", "echo").with_param("q", "same"),
            Task::new("second", "echo").with_param("q", "same"),
        ]);
        let summary = orch.run(&mut plan, &PauseController::new("s")).await.unwrap();

        assert_eq!(summary.status, PlanStatus::Completed);
        assert_eq!(summary.cache_hits(), 1);
        assert_eq!(echo.started.lock().unwrap().len(), 1);
        assert_eq!(summary.results["second"], json!({"q": "same"}));
    }

    #[tokio::test]
    async fn test_dynamic_swarm_runs_everything() {
        let echo = Arc::new(Echo::default());
        let tasks: Vec<Task> = (0..6)
            .map(|i| Task::new(format!("t{i}"), "echo").with_param("i", i))
            .chain(std::iter::once(
                Task::new("join", "echo").with_dependencies(["t0", "t5"]),
            ))
            .collect();
        let mut plan = Plan::new(tasks);

        let opts = ExecutionOpts::default()
            .with_strategy(ExecutionStrategy::DynamicSwarm)
            .with_max_parallel(2);
        let summary = orchestrator(echo.clone(), opts)
            .run(&mut plan, &PauseController::new("s"))
            .await
            .unwrap();

        assert_eq!(summary.status, PlanStatus::Completed);
        assert_eq!(summary.successful, 7);
        let started = echo.started.lock().unwrap();
        assert_eq!(started.last().map(String::as_str), Some("join"));
    }

    #[tokio::test]
    async fn test_pause_timeout_leaves_plan_resumable() {
        let echo = Arc::new(Echo::default());
        let mut plan = Plan::new(vec![Task::new("a", "echo"), Task::new("b", "echo")]);
        let ctl = PauseController::new("s");
        assert!(ctl.request_pause("hold"));

        let orch = orchestrator(
            echo.clone(),
            ExecutionOpts::default().with_resume_timeout(Duration::from_millis(20)),
        );
        let summary = orch.run(&mut plan, &ctl).await.unwrap();
        assert_eq!(summary.status, PlanStatus::Paused);
        assert_eq!(plan.count_status(TaskStatus::Pending), 2);
        assert!(echo.started.lock().unwrap().is_empty());

        assert!(ctl.resume());
        let summary = orch.run(&mut plan, &ctl).await.unwrap();
        assert_eq!(summary.status, PlanStatus::Completed);
        assert_eq!(summary.successful, 2);
    }

    #[tokio::test]
    async fn test_cancelled_session_cancels_pending() {
        let echo = Arc::new(Echo::default());
        let mut plan = Plan::new(vec![Task::new("a", "echo"), Task::new("b", "echo")]);
        let ctl = PauseController::new("s");
        ctl.cancel();

        let summary = orchestrator(echo, ExecutionOpts::default())
            .run(&mut plan, &ctl)
            .await
            .unwrap();
        assert_eq!(summary.status, PlanStatus::Cancelled);
        assert_eq!(plan.count_status(TaskStatus::Cancelled), 2);
    }
}
