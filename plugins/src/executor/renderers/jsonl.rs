use chrono::Local;
use serde_json::{json, Value};
use taskweave_core::executor::traits::{OutputRendererPlugin, RenderEvent};

pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            RenderEvent::RunStart {
                run_id,
                total_tasks,
                strategy,
            } => json!({
                "v": 1,
                "event_type": "run.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "total_tasks": total_tasks,
                    "strategy": strategy.as_str(),
                }
            }),
            RenderEvent::Plan { run_id, levels } => {
                let total_tasks: usize = levels.iter().map(|l| l.len()).sum();
                json!({
                    "v": 1,
                    "event_type": "executor.plan",
                    "ts": ts,
                    "run_id": run_id,
                    "metadata": {
                        "levels": levels,
                        "total_tasks": total_tasks,
                    }
                })
            }
            RenderEvent::BatchStart {
                run_id,
                batch,
                task_ids,
            } => json!({
                "v": 1,
                "event_type": "batch.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "batch": batch,
                    "tasks": task_ids,
                }
            }),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                batch,
            } => json!({
                "v": 1,
                "event_type": "task.start",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "batch": batch,
                }
            }),
            RenderEvent::TaskComplete { run_id, result } => json!({
                "v": 1,
                "event_type": "task.end",
                "ts": ts,
                "run_id": run_id,
                "task_id": result.task_id,
                "output": result.output,
                "error": result.error,
                "metadata": {
                    "duration_ms": result.duration_ms,
                    "cache_hit": result.cache_hit,
                    "success": result.is_success(),
                }
            }),
            RenderEvent::TaskSkipped {
                run_id,
                task_id,
                reason,
            } => json!({
                "v": 1,
                "event_type": "task.skipped",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "reason": reason,
                }
            }),
            RenderEvent::BatchEnd { run_id, batch } => json!({
                "v": 1,
                "event_type": "batch.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "batch": batch,
                }
            }),
            RenderEvent::Paused { run_id, mode } => json!({
                "v": 1,
                "event_type": "run.paused",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "mode": mode.as_str(),
                }
            }),
            RenderEvent::RunEnd { run_id, summary } => json!({
                "v": 1,
                "event_type": "run.end",
                "ts": ts,
                "run_id": run_id,
                "status": summary.status.as_str(),
                "metadata": {
                    "total_tasks": summary.total_tasks,
                    "successful": summary.successful,
                    "failed": summary.failed,
                    "skipped": summary.skipped,
                    "blocked": summary.blocked,
                    "cache_hits": summary.cache_hits(),
                    "batches": summary.batches,
                    "duration_ms": summary.duration_ms,
                }
            }),
        }
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        if self.pretty_print {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".into()));
        } else {
            println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".into()));
        }
    }
}
