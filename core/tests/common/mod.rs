#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use taskweave_core::api::{
    ExecutionError, OutputRendererPlugin, PauseController, RenderEvent, Task, TaskExecutor,
};

/// Executor that records start/end order and can be told to fail or stall.
#[derive(Default)]
pub struct RecordingExecutor {
    log: Mutex<Vec<String>>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    failing: HashSet<String>,
    delay: Duration,
    pause_after: Option<(String, PauseController)>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, task_id: &str) -> Self {
        self.failing.insert(task_id.to_string());
        self
    }

    /// Request a pause on `controller` while `task_id` is executing.
    pub fn pausing_on(mut self, task_id: &str, controller: PauseController) -> Self {
        self.pause_after = Some((task_id.to_string(), controller));
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> usize {
        self.log()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} not in log {:?}", self.log()))
    }

    pub fn started(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|e| e.strip_prefix("start:").map(str::to_string))
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, task: &Task) -> Result<Value, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("start:{}", task.id));

        if let Some((id, controller)) = &self.pause_after {
            if id == &task.id {
                assert!(controller.request_pause(format!("{} asked for review", task.id)));
            }
        }

        tokio::time::sleep(self.delay).await;

        self.log.lock().unwrap().push(format!("end:{}", task.id));
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&task.id) {
            return Err(ExecutionError::failed(format!("{} failed", task.id)));
        }
        Ok(json!({ "task": task.id, "params": task.params }))
    }
}

/// Renderer that keeps a compact trace of every event.
#[derive(Default)]
pub struct TraceRenderer {
    events: Mutex<Vec<String>>,
}

impl TraceRenderer {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl OutputRendererPlugin for TraceRenderer {
    fn name(&self) -> &str {
        "trace"
    }

    fn format(&self) -> &str {
        "trace"
    }

    fn render(&self, event: &RenderEvent) {
        let entry = match event {
            RenderEvent::RunStart { .. } => "run.start".to_string(),
            RenderEvent::Plan { levels, .. } => format!("plan:{}", levels.len()),
            RenderEvent::BatchStart { batch, .. } => format!("batch.start:{batch}"),
            RenderEvent::TaskStart { task_id, .. } => format!("task.start:{task_id}"),
            RenderEvent::TaskComplete { result, .. } => format!("task.end:{}", result.task_id),
            RenderEvent::TaskSkipped { task_id, .. } => format!("task.skipped:{task_id}"),
            RenderEvent::BatchEnd { batch, .. } => format!("batch.end:{batch}"),
            RenderEvent::Paused { mode, .. } => format!("paused:{mode}"),
            RenderEvent::RunEnd { summary, .. } => format!("run.end:{}", summary.status.as_str()),
        };
        self.events.lock().unwrap().push(entry);
    }
}

pub fn ids<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<String> {
    tasks.into_iter().map(|t| t.id.clone()).collect()
}

pub fn executor(inner: RecordingExecutor) -> Arc<RecordingExecutor> {
    Arc::new(inner)
}
