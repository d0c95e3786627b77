use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExecutionError;
use crate::executor::types::Task;

/// Runs one task and returns its opaque payload.
///
/// The orchestrator treats implementations as black boxes: it never inspects
/// the payload and does not constrain any concurrency an executor starts
/// internally. Only the number of concurrent `execute` calls is bounded.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn name(&self) -> &str {
        "executor"
    }

    async fn execute(&self, task: &Task) -> Result<Value, ExecutionError>;
}
