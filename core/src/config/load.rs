use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

pub const CONFIG_ENV: &str = "TASKWEAVE_CONFIG";

/// Get the default taskweave data directory: ~/.taskweave
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".taskweave"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: $TASKWEAVE_CONFIG
    let explicit = std::env::var(CONFIG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    // Priority 2: ~/.taskweave/config.toml, then 3: ./config.toml
    let user_config = get_data_dir().ok().map(|dir| dir.join("config.toml"));
    let local_config = Path::new("config.toml");

    let mut cfg = if let Some(path) = explicit {
        load_from_path(&path)?
    } else if let Some(path) = user_config.filter(|p| p.exists()) {
        load_from_path(&path)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Environment variable overrides (highest priority below CLI flags)
pub fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("TASKWEAVE_MAX_PARALLEL") {
        match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => cfg.orchestrator.max_parallel = n,
            _ => tracing::warn!(value = %v, "ignoring invalid TASKWEAVE_MAX_PARALLEL"),
        }
    }

    if let Ok(v) = std::env::var("TASKWEAVE_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }

    if let Ok(v) = std::env::var("TASKWEAVE_CACHE_ENABLED") {
        match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => cfg.cache.enabled = true,
            "0" | "false" | "no" | "off" => cfg.cache.enabled = false,
            _ => tracing::warn!(value = %v, "ignoring invalid TASKWEAVE_CACHE_ENABLED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::ExecutionStrategy;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.max_parallel, 4);
        assert!(cfg.orchestrator.use_cache);
        assert_eq!(cfg.orchestrator.resume_timeout_ms, None);
        assert_eq!(cfg.cache.max_entries, 1000);
        assert_eq!(cfg.cache.default_ttl_secs, 3600);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[orchestrator]
max_parallel = 8
strategy = "dynamic-swarm"
resume_timeout_ms = 1500

[cache]
max_entries = 10
"#
        )
        .unwrap();

        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.orchestrator.max_parallel, 8);
        assert_eq!(cfg.orchestrator.strategy, Some(ExecutionStrategy::DynamicSwarm));
        assert_eq!(cfg.orchestrator.resume_timeout_ms, Some(1500));
        assert!(cfg.orchestrator.use_cache);
        assert_eq!(cfg.cache.max_entries, 10);
        assert_eq!(cfg.cache.default_ttl_secs, 3600);
        assert!(cfg.logging.enabled);
    }

    #[test]
    fn test_load_invalid_file_names_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\nmax_parallel = \"many\"").unwrap();

        let err = load_from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config"));
    }
}
