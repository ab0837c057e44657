//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! run shell commands, edit files, keep a plan, end the interaction.
//! Every invocation produces a [`ToolResult`] envelope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::agent::AgentStatus;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The outcome of one tool invocation.
///
/// All three fields are optional. A result with none of them set (or only
/// empty strings) is "empty" and renders as no output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Out-of-band note for the loop (e.g. "tool must be restarted").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// When set, merging with another result that defines the same field fails.
    #[serde(skip)]
    pub exclusive: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn system_note(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            ..Default::default()
        }
    }

    /// Builder: mark this result as refusing field concatenation.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Return a copy with `system` replaced.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn is_error(&self) -> bool {
        is_set(&self.error)
    }

    pub fn is_empty(&self) -> bool {
        !is_set(&self.output) && !is_set(&self.error) && !is_set(&self.system)
    }

    /// Combine two results field by field. Same-named fields are concatenated
    /// unless either side is exclusive, in which case a shared field is an error.
    pub fn merge(self, other: ToolResult) -> Result<ToolResult, ToolError> {
        let exclusive = self.exclusive || other.exclusive;
        Ok(ToolResult {
            output: combine("output", self.output, other.output, exclusive)?,
            error: combine("error", self.error, other.error, exclusive)?,
            system: combine("system", self.system, other.system, exclusive)?,
            exclusive,
        })
    }
}

fn is_set(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

fn combine(
    field: &'static str,
    left: Option<String>,
    right: Option<String>,
    exclusive: bool,
) -> Result<Option<String>, ToolError> {
    match (left, right) {
        (Some(l), Some(r)) if !l.is_empty() && !r.is_empty() => {
            if exclusive {
                Err(ToolError::CannotCombine(field))
            } else {
                Ok(Some(l + &r))
            }
        }
        (Some(l), r) if !l.is_empty() => Ok(Some(l).or(r)),
        (l, Some(r)) if !r.is_empty() => Ok(Some(r).or(l)),
        (l, r) => Ok(l.or(r)),
    }
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, &self.output) {
            (Some(e), _) if !e.is_empty() => write!(f, "Error: {e}"),
            (_, Some(o)) => f.write_str(o),
            _ => Ok(()),
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::failure(err.to_string())
    }
}

/// The core Tool trait.
///
/// Each capability (bash, planning, editor, terminate, ...) implements this
/// trait and is registered in a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "bash", "planning").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the oracle).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given, already decoded arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Release exclusive resources (processes, handles). Called at the end
    /// of every run and when a special tool fires.
    async fn cleanup(&self) {}

    /// Called once at registration into an agent. Tools that care about the
    /// agent driving them keep the weak reference; the rest ignore it.
    fn bind_agent(&self, _agent: Weak<AgentStatus>) {}

    /// Convert this tool into a ToolDefinition for sending to the oracle.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, kept in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping its original position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions (for sending to the oracle).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Execute the named tool.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// Run every tool's cleanup hook, in registration order.
    pub async fn cleanup_all(&self) {
        for tool in self.iter() {
            tracing::debug!(tool = tool.name(), "Cleaning up tool");
            tool.cleanup().await;
        }
    }

    /// Hand every tool a weak reference to the agent's status.
    pub fn bind_agent(&self, status: &Arc<AgentStatus>) {
        for tool in self.iter() {
            tool.bind_agent(Arc::downgrade(status));
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}
