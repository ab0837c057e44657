//! Software-engineering agent.
//!
//! Works through a persistent bash shell and the file editor. Before every
//! think it asks the shell for its working directory and fills the
//! `{current_dir}` placeholder of the next-step prompt with it.

use std::sync::Arc;

use async_trait::async_trait;
use taskloom_core::Result;
use taskloom_core::tool::Tool;
use taskloom_tools::BashTool;
use tracing::{debug, warn};

use crate::base::{Agent, AgentCore};
use crate::toolcall::ToolCallAgent;

const CURRENT_DIR: &str = "{current_dir}";

pub struct SweAgent {
    inner: ToolCallAgent,
    bash: Arc<BashTool>,
    working_dir: String,
}

impl SweAgent {
    /// Wrap `core`. `bash` must be the shell registered with the core so
    /// that `pwd` reflects where the oracle's commands ran.
    pub fn new(core: AgentCore, bash: Arc<BashTool>) -> Self {
        Self {
            inner: ToolCallAgent::new(core),
            bash,
            working_dir: ".".to_string(),
        }
    }

    /// The shell's working directory as of the last think.
    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    async fn refresh_working_dir(&mut self) {
        match self.bash.execute(serde_json::json!({"command": "pwd"})).await {
            Ok(result) if !result.is_error() => {
                if let Some(dir) = result.output.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                    self.working_dir = dir.to_string();
                }
            }
            Ok(result) => warn!(error = ?result.error, "pwd failed, keeping last directory"),
            Err(e) => warn!(error = %e, "pwd failed, keeping last directory"),
        }
        debug!(working_dir = %self.working_dir, "Shell working directory");
    }
}

#[async_trait]
impl Agent for SweAgent {
    fn core(&self) -> &AgentCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        self.inner.core_mut()
    }

    async fn think(&mut self) -> Result<bool> {
        self.refresh_working_dir().await;

        let core = self.inner.core_mut();
        let filled = core
            .next_step_prompt
            .as_deref()
            .map(|template| template.replace(CURRENT_DIR, &self.working_dir));
        let template = std::mem::replace(&mut core.next_step_prompt, filled);

        let outcome = self.inner.think().await;
        self.inner.core_mut().next_step_prompt = template;
        outcome
    }

    async fn act(&mut self) -> Result<String> {
        self.inner.act().await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::prompt::SWE_NEXT_STEP_TEMPLATE;
    use crate::test_helpers::*;
    use taskloom_core::tool::ToolRegistry;
    use taskloom_tools::{SessionOptions, TerminateTool};

    #[tokio::test]
    async fn prompt_shows_shell_directory_and_template_survives() {
        let dir = tempfile::tempdir().unwrap();
        let bash = Arc::new(BashTool::new(SessionOptions {
            working_dir: Some(dir.path().to_path_buf()),
            ..SessionOptions::default()
        }));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                vec![make_tool_call("bash", serde_json::json!({"command": "mkdir sub && cd sub"}))],
                "",
            ),
            make_tool_call_response(vec![terminate_call("success")], ""),
        ]));
        let tools = ToolRegistry::new()
            .with(bash.clone())
            .with(Arc::new(TerminateTool::new()));
        let core = AgentCore::new("swe", provider.clone(), "mock-model", tools)
            .with_next_step_prompt(SWE_NEXT_STEP_TEMPLATE);
        let mut agent = SweAgent::new(core, bash.clone());

        agent.run(Some("fix it".into())).await.unwrap();

        let requests = provider.requests();
        let first = requests[0].messages.last().unwrap().text().to_string();
        let second = requests[1].messages.last().unwrap().text().to_string();
        let root = dir.path().canonicalize().unwrap();
        assert!(first.starts_with("(Current directory: "));
        assert!(first.contains(root.file_name().unwrap().to_str().unwrap()));
        assert!(second.contains("/sub)"));
        assert!(agent.working_dir().ends_with("/sub"));
        assert_eq!(
            agent.core().next_step_prompt.as_deref(),
            Some(SWE_NEXT_STEP_TEMPLATE)
        );
    }
}
