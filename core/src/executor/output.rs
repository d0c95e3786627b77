use std::sync::Arc;

use super::traits::{OutputRendererPlugin, RenderEvent};

/// Routes render events to the configured renderer, or to `tracing` when none is set.
#[derive(Clone, Default)]
pub struct Emitter {
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
}

impl Emitter {
    pub fn new(renderer: Option<Arc<dyn OutputRendererPlugin>>) -> Self {
        Self { renderer }
    }

    pub fn emit(&self, event: RenderEvent) {
        match &self.renderer {
            Some(renderer) => renderer.render(&event),
            None => emit_fallback(&event),
        }
    }
}

/// Log a render event through `tracing`
pub fn emit_fallback(event: &RenderEvent) {
    match event {
        RenderEvent::RunStart {
            run_id,
            total_tasks,
            strategy,
        } => emit_run_start(run_id, *total_tasks, strategy.as_str()),
        RenderEvent::Plan { run_id, levels } => emit_execution_plan(run_id, levels),
        RenderEvent::BatchStart {
            run_id,
            batch,
            task_ids,
        } => emit_batch_start(run_id, *batch, task_ids),
        RenderEvent::TaskStart {
            run_id,
            task_id,
            batch,
        } => {
            tracing::debug!(run_id = %run_id, task_id = %task_id, batch = *batch, "task started");
        }
        RenderEvent::TaskComplete { run_id, result } => {
            if let Some(error) = &result.error {
                tracing::warn!(
                    run_id = %run_id,
                    task_id = %result.task_id,
                    duration_ms = result.duration_ms,
                    error = %error,
                    "task failed"
                );
            } else {
                tracing::info!(
                    run_id = %run_id,
                    task_id = %result.task_id,
                    duration_ms = result.duration_ms,
                    cache_hit = result.cache_hit,
                    "task completed"
                );
            }
        }
        RenderEvent::TaskSkipped {
            run_id,
            task_id,
            reason,
        } => {
            tracing::info!(run_id = %run_id, task_id = %task_id, reason = %reason, "task skipped");
        }
        RenderEvent::BatchEnd { run_id, batch } => {
            tracing::debug!(run_id = %run_id, batch = *batch, "batch finished");
        }
        RenderEvent::Paused { run_id, mode } => {
            tracing::info!(run_id = %run_id, mode = %mode, "run paused, waiting for resume");
        }
        RenderEvent::RunEnd { run_id, summary } => {
            tracing::info!(
                run_id = %run_id,
                status = summary.status.as_str(),
                successful = summary.successful,
                failed = summary.failed,
                skipped = summary.skipped.len(),
                blocked = summary.blocked.len(),
                duration_ms = summary.duration_ms,
                "run finished"
            );
        }
    }
}

fn emit_run_start(run_id: &str, total_tasks: usize, strategy: &str) {
    tracing::info!(run_id = %run_id, total_tasks, strategy, "run started");
}

fn emit_execution_plan(run_id: &str, levels: &[Vec<String>]) {
    for (i, level) in levels.iter().enumerate() {
        tracing::debug!(run_id = %run_id, level = i, tasks = %level.join(", "), "execution level");
    }
}

fn emit_batch_start(run_id: &str, batch: usize, task_ids: &[String]) {
    tracing::debug!(
        run_id = %run_id,
        batch,
        size = task_ids.len(),
        tasks = %task_ids.join(", "),
        "batch started"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl OutputRendererPlugin for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        fn format(&self) -> &str {
            "test"
        }
        fn render(&self, event: &RenderEvent) {
            self.events.lock().unwrap().push(event.run_id().to_string());
        }
    }

    #[test]
    fn test_emitter_prefers_renderer() {
        let renderer = Arc::new(Recording::default());
        let emitter = Emitter::new(Some(renderer.clone()));
        emitter.emit(RenderEvent::BatchEnd {
            run_id: "r1".into(),
            batch: 1,
        });
        assert_eq!(*renderer.events.lock().unwrap(), vec!["r1".to_string()]);
    }

    #[test]
    fn test_fallback_does_not_panic_without_subscriber() {
        Emitter::default().emit(RenderEvent::Plan {
            run_id: "r1".into(),
            levels: vec![vec!["a".into(), "b".into()], vec!["c".into()]],
        });
    }
}
