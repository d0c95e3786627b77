use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use taskweave_core::error::ExecutionError;
use taskweave_core::executor::traits::TaskExecutor;
use taskweave_core::executor::types::Task;

/// Returns the task's parameters as its payload.
///
/// `delay_ms` sleeps before returning and `fail` turns the call into an error
/// carrying that message; both stay in the echoed payload.
pub struct EchoTool;

#[async_trait]
impl TaskExecutor for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, task: &Task) -> Result<Value, ExecutionError> {
        if let Some(delay) = task.params.get("delay_ms") {
            let ms = delay
                .as_u64()
                .ok_or_else(|| ExecutionError::InvalidParams("delay_ms must be a non-negative integer".into()))?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        if let Some(message) = task.params.get("fail") {
            let message = message.as_str().map(str::to_string).unwrap_or_else(|| message.to_string());
            return Err(ExecutionError::Failed(message));
        }

        Ok(Value::Object(task.params.clone()))
    }
}
