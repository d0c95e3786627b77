use taskweave_core::executor::traits::{OutputRendererPlugin, RenderEvent};

pub struct TextRendererPlugin {
    ascii_only: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn format_event(&self, event: &RenderEvent) -> String {
        match event {
            RenderEvent::RunStart {
                run_id,
                total_tasks,
                strategy,
            } => format!(
                "RUN START {} (tasks: {}, strategy: {})",
                run_id, total_tasks, strategy
            ),
            RenderEvent::Plan { run_id, levels } => {
                let mut out = format!("PLAN {}:", run_id);
                for (idx, level) in levels.iter().enumerate() {
                    out.push_str(&format!("\n  level {}: {}", idx, level.join(", ")));
                }
                out
            }
            RenderEvent::BatchStart {
                run_id,
                batch,
                task_ids,
            } => format!(
                "BATCH START {} (batch {}, tasks: {})",
                run_id,
                batch,
                task_ids.join(", ")
            ),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                batch,
            } => format!("TASK START {} (batch {}, task {})", run_id, batch, task_id),
            RenderEvent::TaskComplete { run_id, result } => {
                let status = match (result.is_success(), self.ascii_only) {
                    (true, true) => "OK",
                    (true, false) => "SUCCESS",
                    (false, true) => "FAIL",
                    (false, false) => "FAILED",
                };
                let mut line = format!(
                    "TASK END {} (task {}, status {}, duration {}ms",
                    run_id, result.task_id, status, result.duration_ms
                );
                if result.cache_hit {
                    line.push_str(", cached");
                }
                line.push(')');
                if let Some(err) = &result.error {
                    line.push_str(&format!(": {}", err));
                }
                line
            }
            RenderEvent::TaskSkipped {
                run_id,
                task_id,
                reason,
            } => format!("TASK SKIPPED {} (task {}): {}", run_id, task_id, reason),
            RenderEvent::BatchEnd { run_id, batch } => {
                format!("BATCH END {} (batch {})", run_id, batch)
            }
            RenderEvent::Paused { run_id, mode } => {
                format!("RUN PAUSED {} (mode {})", run_id, mode)
            }
            RenderEvent::RunEnd { run_id, summary } => {
                let mut line = format!(
                    "RUN END {} (status {}, completed {}, failed {}, duration {}ms)",
                    run_id,
                    summary.status.as_str(),
                    summary.successful,
                    summary.failed,
                    summary.duration_ms
                );
                if !summary.skipped.is_empty() {
                    line.push_str(&format!("\n  skipped: {}", summary.skipped.join(", ")));
                }
                if !summary.blocked.is_empty() {
                    line.push_str(&format!("\n  blocked: {}", summary.blocked.join(", ")));
                }
                line
            }
        }
    }
}

impl OutputRendererPlugin for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, event: &RenderEvent) {
        println!("{}", self.format_event(event));
    }
}
