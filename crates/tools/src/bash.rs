//! Bash tool: commands against a persistent [`CommandSession`].
//!
//! The session survives between calls, so `cd` and exported variables
//! carry over. A session that can no longer serve commands (timed out,
//! exited) is discarded and the next call starts a fresh one.

use async_trait::async_trait;
use serde::Deserialize;
use taskloom_core::error::{SessionDisposition, ToolError};
use taskloom_core::tool::{Tool, ToolResult};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::session::{CommandSession, SessionOptions};

const DESCRIPTION: &str = "Execute a bash command in the terminal.
* Long running commands: For commands that may run indefinitely, run them in the background and redirect output to a file, e.g. command = `python3 app.py > server.log 2>&1 &`.
* State persists between calls: the working directory and exported variables are kept.
* Timeout: if a command times out, the shell is restarted for the next call; retry long commands in the background.
* Set `restart` to true to get a fresh shell.";

#[derive(Debug, Deserialize)]
struct BashArgs {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    restart: bool,
}

pub struct BashTool {
    options: SessionOptions,
    session: Mutex<Option<CommandSession>>,
}

impl BashTool {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            session: Mutex::new(None),
        }
    }

    async fn fresh_session(&self) -> Result<CommandSession, ToolError> {
        let mut session = CommandSession::new(self.options.clone());
        session.start().await?;
        Ok(session)
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute."
                },
                "restart": {
                    "type": "boolean",
                    "description": "Replace the shell with a fresh one before doing anything else."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: BashArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        // One command in flight per session.
        let mut guard = self.session.lock().await;

        if args.restart {
            if let Some(mut old) = guard.take() {
                old.stop();
            }
            *guard = Some(self.fresh_session().await?);
            debug!("Bash session restarted");
            return Ok(ToolResult::system_note("tool has been restarted."));
        }

        let mut session = match guard.take() {
            Some(session) => session,
            None => self.fresh_session().await?,
        };

        let Some(command) = args.command else {
            *guard = Some(session);
            return Ok(ToolResult::failure("no command provided."));
        };

        match session.run(&command).await {
            Ok(result) => {
                *guard = Some(session);
                Ok(result)
            }
            Err(e) => match e.disposition() {
                SessionDisposition::MustRestart => {
                    warn!(error = %e, "Bash session unusable, discarding it");
                    session.stop();
                    Ok(ToolResult::failure(e.to_string()).with_system("tool must be restarted"))
                }
                SessionDisposition::Recoverable => {
                    *guard = Some(session);
                    Err(e.into())
                }
            },
        }
    }

    async fn cleanup(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            session.stop();
        }
    }
}
