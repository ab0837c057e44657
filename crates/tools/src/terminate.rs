//! Terminate tool: the oracle's way of ending an interaction.
//!
//! Executing it only produces a confirmation. Ending the run is the
//! dispatcher's job: `terminate` is a special tool, so the loop releases
//! resources and moves the agent to `Finished` after it runs.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::{OnceLock, Weak};
use taskloom_core::agent::AgentStatus;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Tool, ToolResult};
use tracing::info;

pub const NAME: &str = "terminate";

const DESCRIPTION: &str = "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task.
When you have finished all the tasks, call this tool to end the work.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishStatus {
    Success,
    Failure,
}

impl fmt::Display for FinishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FinishStatus::Success => "success",
            FinishStatus::Failure => "failure",
        })
    }
}

#[derive(Debug, Deserialize)]
struct TerminateArgs {
    status: FinishStatus,
}

#[derive(Default)]
pub struct TerminateTool {
    agent: OnceLock<Weak<AgentStatus>>,
}

impl TerminateTool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: TerminateArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        if let Some(agent) = self.agent.get().and_then(Weak::upgrade) {
            info!(
                agent = agent.name(),
                step = agent.current_step(),
                status = %args.status,
                "Interaction terminated"
            );
        }

        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {}",
            args.status
        )))
    }

    fn bind_agent(&self, agent: Weak<AgentStatus>) {
        let _ = self.agent.set(agent);
    }
}
