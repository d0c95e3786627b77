use std::time::Duration;

use crate::config::AppConfig;

use super::plan::ExecutionStrategy;

/// Execution options for a single orchestrator run.
#[derive(Debug, Clone)]
pub struct ExecutionOpts {
    /// Maximum tasks in flight at once
    pub max_parallel: usize,

    /// Overrides the strategy decided for the plan
    pub strategy: Option<ExecutionStrategy>,

    /// Route dispatches through the execution cache
    pub use_cache: bool,

    /// TTL for cached executor results
    pub cache_ttl: Duration,

    /// How long to wait for a paused session to resume. `None` waits forever.
    pub resume_timeout: Option<Duration>,

    /// Enable visual progress bar
    pub progress_bar: bool,

    /// Explicit run id (generated when unset)
    pub run_id: Option<String>,
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            strategy: None,
            use_cache: true,
            cache_ttl: Duration::from_secs(3600),
            resume_timeout: None,
            progress_bar: false,
            run_id: None,
        }
    }
}

impl ExecutionOpts {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_parallel: cfg.orchestrator.max_parallel.max(1),
            strategy: cfg.orchestrator.strategy,
            use_cache: cfg.orchestrator.use_cache && cfg.cache.enabled,
            cache_ttl: Duration::from_secs(cfg.cache.default_ttl_secs),
            resume_timeout: cfg.orchestrator.resume_timeout_ms.map(Duration::from_millis),
            progress_bar: cfg.orchestrator.progress_bar,
            run_id: None,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn with_resume_timeout(mut self, timeout: Duration) -> Self {
        self.resume_timeout = Some(timeout);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}
