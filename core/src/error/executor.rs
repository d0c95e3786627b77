use thiserror::Error;

/// Error returned by a task executor. Stays local to the task that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Task execution failed: {0}")]
    Failed(String),

    #[error("No executor registered for tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid tool parameters: {0}")]
    InvalidParams(String),

    #[error("io error: {0}")]
    Io(String),
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Cache-layer failures. Callers treat these as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to serialize cache key parameters: {0}")]
    KeySerialization(#[from] serde_json::Error),
}
