//! Python execution tool: runs a code string in a separate interpreter.
//!
//! Only what the code prints is visible. Each call gets a fresh process,
//! killed when it outlives its timeout.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

pub const NAME: &str = "python_execute";

pub struct PythonExecute {
    interpreter: String,
    default_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct PythonArgs {
    code: String,
    #[serde(default)]
    timeout: Option<u64>,
}

impl PythonExecute {
    pub fn new(interpreter: impl Into<String>, default_timeout_secs: u64) -> Self {
        Self {
            interpreter: interpreter.into(),
            default_timeout_secs,
        }
    }
}

impl Default for PythonExecute {
    fn default() -> Self {
        Self::new("python3", 5)
    }
}

impl From<&taskloom_config::ToolsConfig> for PythonExecute {
    fn from(config: &taskloom_config::ToolsConfig) -> Self {
        Self::new(config.python.clone(), config.python_timeout_secs)
    }
}

#[async_trait]
impl Tool for PythonExecute {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Executes Python code string. Note: Only print outputs are visible, function return values are not captured. Use print statements to see results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to execute."
                },
                "timeout": {
                    "type": "integer",
                    "description": "Maximum execution time in seconds."
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: PythonArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let timeout = args.timeout.unwrap_or(self.default_timeout_secs);

        let child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(&args.code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("failed to start {}: {e}", self.interpreter),
            })?;

        debug!(timeout_secs = timeout, "Running python code");

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(
            Duration::from_secs(timeout),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result.map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                warn!(timeout_secs = timeout, "Python execution timed out");
                return Ok(ToolResult::failure(format!(
                    "Execution timeout after {timeout} seconds"
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(ToolResult::success(stdout))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The last stderr line carries the exception message.
            let message = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("python exited with an error")
                .to_string();
            Ok(ToolResult {
                output: Some(stdout).filter(|s| !s.is_empty()),
                error: Some(message),
                ..Default::default()
            })
        }
    }
}
