use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use taskweave_core::error::ExecutionError;
use taskweave_core::executor::traits::TaskExecutor;
use taskweave_core::executor::types::Task;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct ShellParams {
    command: String,
    #[serde(default)]
    args: Option<Vec<String>>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// Runs a command and returns its exit code and captured output.
///
/// With `args` the command is spawned directly; without, `command` is passed
/// to the platform shell. A non-zero exit status fails the task.
pub struct ShellTool {
    default_timeout: Option<Duration>,
}

impl ShellTool {
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self { default_timeout }
    }

    fn build_command(params: &ShellParams) -> Command {
        let mut cmd = match &params.args {
            Some(args) => {
                let mut cmd = Command::new(&params.command);
                cmd.args(args);
                cmd
            }
            None if cfg!(windows) => {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(&params.command);
                cmd
            }
            None => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(&params.command);
                cmd
            }
        };
        if let Some(cwd) = &params.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&params.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl TaskExecutor for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    async fn execute(&self, task: &Task) -> Result<Value, ExecutionError> {
        let params: ShellParams = serde_json::from_value(Value::Object(task.params.clone()))
            .map_err(|e| ExecutionError::InvalidParams(e.to_string()))?;

        let timeout = params
            .timeout_ms
            .map(Duration::from_millis)
            .or(self.default_timeout);

        tracing::debug!(task_id = %task.id, command = %params.command, "spawning shell task");
        let output = Self::build_command(&params).output();
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| {
                ExecutionError::Failed(format!("command timed out after {}ms", limit.as_millis()))
            })??,
            None => output.await?,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let detail = stderr.trim();
            return Err(ExecutionError::Failed(if detail.is_empty() {
                format!("command exited with code {}", exit_code)
            } else {
                format!("command exited with code {}: {}", exit_code, detail)
            }));
        }

        Ok(json!({
            "exit_code": exit_code,
            "stdout": stdout,
            "stderr": stderr,
        }))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_captures_stdout() {
        let task = Task::new("a", "shell").with_param("command", "echo hello");
        let value = ShellTool::default().execute(&task).await.unwrap();
        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["stdout"], "hello\n");
    }

    #[tokio::test]
    async fn test_shell_nonzero_exit_fails() {
        let task = Task::new("a", "shell").with_param("command", "echo oops >&2; exit 3");
        let err = ShellTool::default().execute(&task).await.unwrap_err();
        assert_eq!(err, ExecutionError::Failed("command exited with code 3: oops".into()));
    }

    #[tokio::test]
    async fn test_shell_missing_command() {
        let task = Task::new("a", "shell");
        assert!(matches!(
            ShellTool::default().execute(&task).await,
            Err(ExecutionError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_shell_timeout() {
        let task = Task::new("a", "shell")
            .with_param("command", "sleep 5")
            .with_param("timeout_ms", 50);
        let err = ShellTool::default().execute(&task).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
