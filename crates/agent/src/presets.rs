//! Ready-made agents wired from configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use taskloom_config::AppConfig;
use taskloom_core::event::EventBus;
use taskloom_core::provider::Provider;
use taskloom_core::tool::ToolRegistry;
use taskloom_tools::{BashTool, PlanningTool};

use crate::base::{Agent, AgentCore};
use crate::planning::PlanningAgent;
use crate::prompt;
use crate::swe::SweAgent;
use crate::toolcall::ToolCallAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Bare tool-calling agent with only `terminate`.
    ToolCall,
    /// Python, file editing and file saving.
    General,
    /// Persistent bash shell and file editor.
    Swe,
    /// General tools driven by a tracked plan.
    Planning,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::ToolCall, Preset::General, Preset::Swe, Preset::Planning];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::ToolCall => "toolcall",
            Preset::General => "general",
            Preset::Swe => "swe",
            Preset::Planning => "planning",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = Preset::ALL.iter().map(Preset::as_str).collect();
                format!("unknown agent '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// Build the agent for `preset`, publishing on `events` when given.
pub fn build(
    preset: Preset,
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    events: Option<EventBus>,
) -> Box<dyn Agent> {
    match preset {
        Preset::ToolCall => Box::new(toolcall_agent(config, provider, events)),
        Preset::General => Box::new(general_agent(config, provider, events)),
        Preset::Swe => Box::new(swe_agent(config, provider, events)),
        Preset::Planning => Box::new(planning_agent(config, provider, events)),
    }
}

fn core(
    name: &str,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    config: &AppConfig,
    events: Option<EventBus>,
) -> AgentCore {
    let core = AgentCore::from_config(name, provider, tools, config);
    match events {
        Some(bus) => core.with_event_bus(bus),
        None => core,
    }
}

pub fn toolcall_agent(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    events: Option<EventBus>,
) -> ToolCallAgent {
    let tools = ToolRegistry::new().with(Arc::new(taskloom_tools::TerminateTool::new()));
    ToolCallAgent::new(
        core("toolcall", provider, tools, config, events)
            .with_system_prompt(prompt::TOOLCALL_SYSTEM)
            .with_next_step_prompt(prompt::TOOLCALL_NEXT_STEP),
    )
}

pub fn general_agent(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    events: Option<EventBus>,
) -> ToolCallAgent {
    let system = prompt::GENERAL_SYSTEM.replace(
        "{directory}",
        &config.workspace_dir().display().to_string(),
    );
    ToolCallAgent::new(
        core("general", provider, taskloom_tools::general_registry(config), config, events)
            .with_system_prompt(system)
            .with_next_step_prompt(prompt::GENERAL_NEXT_STEP),
    )
}

pub fn swe_agent(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    events: Option<EventBus>,
) -> SweAgent {
    let bash = Arc::new(BashTool::new(taskloom_tools::session_options(config)));
    let tools = taskloom_tools::swe_registry(bash.clone());
    SweAgent::new(
        core("swe", provider, tools, config, events)
            .with_system_prompt(prompt::SWE_SYSTEM)
            .with_next_step_prompt(prompt::SWE_NEXT_STEP_TEMPLATE),
        bash,
    )
}

pub fn planning_agent(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    events: Option<EventBus>,
) -> PlanningAgent {
    let planning = Arc::new(PlanningTool::new());
    let general = taskloom_tools::general_registry(config);
    let mut tools = taskloom_tools::planning_registry(planning.clone());
    for name in ["python_execute", "str_replace_editor", "file_saver"] {
        if let Some(tool) = general.get(name) {
            tools.register(tool);
        }
    }
    PlanningAgent::new(
        core("planning", provider, tools, config, events)
            .with_system_prompt(prompt::PLANNING_SYSTEM)
            .with_next_step_prompt(prompt::PLANNING_NEXT_STEP),
        planning,
    )
}
