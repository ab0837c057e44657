//! Tool-calling agent. Think asks the oracle for tool calls, act runs them.
//!
//! How a turn without tool calls is treated depends on the tool-choice
//! policy:
//!
//! - `none`: tool calls are ignored; non-empty content alone is an action.
//! - `auto`: no tool calls means act only if the oracle said something.
//! - `required`: a turn without tool calls fails the run from `act`.

use async_trait::async_trait;
use taskloom_core::message::{Message, ToolCall};
use taskloom_core::provider::ToolChoice;
use taskloom_core::{AgentState, Error, Result};
use tracing::{debug, info, warn};

use crate::base::{Agent, AgentCore};

pub struct ToolCallAgent {
    core: AgentCore,
    tool_calls: Vec<ToolCall>,
}

impl ToolCallAgent {
    pub fn new(core: AgentCore) -> Self {
        Self {
            core,
            tool_calls: Vec::new(),
        }
    }

    /// The tool calls chosen by the latest think.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }
}

#[async_trait]
impl Agent for ToolCallAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn think(&mut self) -> Result<bool> {
        let core = &mut self.core;
        if let Some(prompt) = core.next_step_prompt.clone().filter(|p| !p.is_empty()) {
            core.memory.append(Message::user(prompt));
        }

        let choice = core.tool_choice();
        let response = core.ask(core.memory.snapshot(), choice).await?;
        let content = response.content.filter(|c| !c.is_empty());

        info!(
            agent = core.name(),
            thoughts = content.as_deref().unwrap_or(""),
            tool_calls = response.tool_calls.len(),
            "Oracle turn"
        );
        for call in &response.tool_calls {
            debug!(tool = %call.name, arguments = %call.arguments, "Tool selected");
        }

        if choice == ToolChoice::None {
            if !response.tool_calls.is_empty() {
                warn!(agent = core.name(), "Tool calls offered although tools are disabled");
            }
            self.tool_calls.clear();
            return Ok(match content {
                Some(text) => {
                    core.memory.append(Message::assistant(text));
                    true
                }
                None => false,
            });
        }

        self.tool_calls = response.tool_calls;
        let has_content = content.is_some();
        core.memory.append(Message::assistant_with_tool_calls(
            content,
            self.tool_calls.clone(),
        ));

        Ok(match (choice, self.tool_calls.is_empty()) {
            // act() reports the missing calls
            (ToolChoice::Required, true) => true,
            (ToolChoice::Auto, true) => has_content,
            (_, empty) => !empty,
        })
    }

    async fn act(&mut self) -> Result<String> {
        let core = &mut self.core;
        if self.tool_calls.is_empty() {
            if core.tool_choice() == ToolChoice::Required {
                return Err(Error::ToolCallRequired);
            }
            return Ok(core
                .memory
                .last()
                .and_then(|m| m.content.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "No content or commands to execute".to_string()));
        }

        let mut results = Vec::with_capacity(self.tool_calls.len());
        for call in &self.tool_calls {
            let dispatched = core
                .dispatcher()
                .dispatch(core.tools(), call, core.events())
                .await;
            info!(
                tool = %dispatched.tool_name,
                success = !dispatched.result.is_error(),
                "Tool completed"
            );
            core.memory.append(Message::tool(
                dispatched.observation.clone(),
                dispatched.tool_name,
                dispatched.call_id,
            ));
            results.push(dispatched.observation);

            if dispatched.finished {
                core.set_state(AgentState::Finished);
                break;
            }
        }

        Ok(results.join("\n\n"))
    }
}
