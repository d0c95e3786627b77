mod echo;
mod shell;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use taskweave_core::error::ExecutionError;
use taskweave_core::executor::traits::TaskExecutor;
use taskweave_core::executor::types::Task;

pub use echo::EchoTool;
pub use shell::ShellTool;

/// Dispatches each task to the executor registered for its `tool` id.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn TaskExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `echo` and `shell` tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("echo", Arc::new(EchoTool));
        registry.register("shell", Arc::new(ShellTool::default()));
        registry
    }

    /// Register (or replace) the executor for a tool id.
    pub fn register(&mut self, tool: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        self.tools.insert(tool.into(), executor);
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.tools.contains_key(tool)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TaskExecutor for ToolRegistry {
    fn name(&self) -> &str {
        "tool-registry"
    }

    async fn execute(&self, task: &Task) -> Result<Value, ExecutionError> {
        let executor = self
            .tools
            .get(&task.tool)
            .ok_or_else(|| ExecutionError::UnknownTool(task.tool.clone()))?;
        tracing::debug!(task_id = %task.id, tool = %task.tool, executor = executor.name(), "dispatching task");
        executor.execute(task).await
    }
}
