use std::sync::Arc;
use std::time::Duration;

use taskweave_core::api::{AppConfig, ExecutionCache, OutputRendererPlugin};

use crate::executor::{EchoTool, JsonlRendererPlugin, ShellTool, TextRendererPlugin, ToolRegistry};

pub fn build_renderer(stream_format: &str) -> Arc<dyn OutputRendererPlugin> {
    match stream_format {
        "jsonl" => Arc::new(JsonlRendererPlugin::new(false)),
        "jsonl-pretty" => Arc::new(JsonlRendererPlugin::new(true)),
        // Anything else renders as text.
        _ => Arc::new(TextRendererPlugin::new(false)),
    }
}

/// Built-in tools. `shell_timeout` bounds every shell task that sets no `timeout_ms`.
pub fn build_registry(shell_timeout: Option<Duration>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register("echo", Arc::new(EchoTool));
    registry.register("shell", Arc::new(ShellTool::new(shell_timeout)));
    registry
}

pub fn build_cache(cfg: &AppConfig) -> Option<Arc<ExecutionCache>> {
    if !cfg.cache.enabled {
        return None;
    }
    Some(Arc::new(ExecutionCache::from_config(&cfg.cache)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_renderer_formats() {
        assert_eq!(build_renderer("jsonl").format(), "jsonl");
        assert_eq!(build_renderer("text").format(), "text");
        assert_eq!(build_renderer("whatever").format(), "text");
    }

    #[test]
    fn test_build_cache_respects_enabled() {
        let mut cfg = AppConfig::default();
        let cache = build_cache(&cfg).unwrap();
        assert_eq!(cache.capacity(), cfg.cache.max_entries);

        cfg.cache.enabled = false;
        assert!(build_cache(&cfg).is_none());
    }

    #[test]
    fn test_build_registry_has_builtins() {
        let registry = build_registry(None);
        assert!(registry.contains("echo"));
        assert!(registry.contains("shell"));
    }
}
