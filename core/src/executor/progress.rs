use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Visual progress monitor for a plan run
///
/// One overall bar plus a spinner per in-flight task. Everything is a no-op
/// when disabled (e.g. for JSONL output).
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: HashMap<String, ProgressBar>,
    enabled: bool,
}

impl ProgressMonitor {
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));

        let style = ProgressStyle::with_template("{elapsed:>4} {wide_bar:.green/white} {pos}/{len} done {msg}")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        overall.set_style(style);
        overall.set_message("resolving ready tasks");

        Self {
            multi,
            overall,
            task_bars: HashMap::new(),
            enabled: true,
        }
    }

    fn disabled() -> Self {
        Self {
            multi: MultiProgress::new(),
            overall: ProgressBar::hidden(),
            task_bars: HashMap::new(),
            enabled: false,
        }
    }

    /// Count tasks that already finished in an earlier run of the same plan.
    pub fn skip(&self, already_done: usize) {
        if self.enabled {
            self.overall.inc(already_done as u64);
        }
    }

    pub fn add_task(&mut self, task_id: &str) {
        if !self.enabled {
            return;
        }

        let spinner = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {prefix} {msg:.dim}") {
            spinner.set_style(style);
        }
        spinner.set_prefix(task_id.to_string());
        spinner.set_message("running");
        spinner.enable_steady_tick(Duration::from_millis(120));

        self.task_bars.insert(task_id.to_string(), spinner);
    }

    pub fn complete_task(&mut self, task_id: &str, success: bool, cache_hit: bool, duration_ms: u64) {
        if !self.enabled {
            return;
        }

        if let Some(bar) = self.task_bars.remove(task_id) {
            let outcome = match (success, cache_hit) {
                (true, true) => "done, cached",
                (true, false) => "done",
                (false, _) => "failed",
            };
            bar.finish_with_message(format!("{outcome} in {duration_ms}ms"));
        }

        self.overall.inc(1);
    }

    /// A task that will not run (rejected, blocked or cancelled)
    pub fn drop_task(&mut self, task_id: &str, label: &str) {
        if !self.enabled {
            return;
        }
        if let Some(bar) = self.task_bars.remove(task_id) {
            bar.finish_and_clear();
        }
        self.overall.println(format!("  ⏭ {} ({})", task_id, label));
        self.overall.inc(1);
    }

    pub fn set_message(&self, msg: &str) {
        if self.enabled {
            self.overall.set_message(msg.to_string());
        }
    }

    pub fn update_batch(&self, batch: usize, size: usize) {
        if self.enabled {
            self.overall.set_message(format!("batch #{batch}: {size} dispatched"));
        }
    }

    pub fn finish(&self, success: bool) {
        if !self.enabled {
            return;
        }

        if success {
            self.overall.finish_with_message("plan completed");
        } else {
            self.overall.abandon_with_message("plan finished with unfinished tasks");
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        for (_, bar) in self.task_bars.drain() {
            bar.finish_and_clear();
        }
    }
}
