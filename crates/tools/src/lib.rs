//! Built-in tool implementations for taskloom.
//!
//! Tools give an agent its hands: a persistent bash shell, a file editor
//! with undo, a Python runner, a file saver, the planning checklist, and
//! `terminate` to end the interaction.
//!
//! The registry builders below assemble the tool set for each agent preset.

pub mod bash;
pub mod file_saver;
pub mod planning;
pub mod python_execute;
pub mod session;
pub mod str_replace_editor;
pub mod terminate;

use std::sync::Arc;

use taskloom_config::AppConfig;
use taskloom_core::tool::ToolRegistry;

pub use bash::BashTool;
pub use file_saver::FileSaver;
pub use planning::{PlanCommand, PlanStore, PlanningTool, StepStatus};
pub use python_execute::PythonExecute;
pub use session::{CommandSession, SessionOptions};
pub use str_replace_editor::{EditorCommand, StrReplaceEditor};
pub use terminate::{FinishStatus, TerminateTool};

/// Tools for the general-purpose agent.
pub fn general_registry(config: &AppConfig) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(PythonExecute::from(&config.tools)))
        .with(Arc::new(StrReplaceEditor::new()))
        .with(Arc::new(FileSaver))
        .with(Arc::new(TerminateTool::new()))
}

/// Tools for the software-engineering agent. The bash tool is shared with
/// the caller so the agent can query the shell's working directory.
pub fn swe_registry(bash: Arc<BashTool>) -> ToolRegistry {
    ToolRegistry::new()
        .with(bash)
        .with(Arc::new(StrReplaceEditor::new()))
        .with(Arc::new(TerminateTool::new()))
}

/// Tools for the planning agent. The planning tool is shared with the
/// caller so the agent can read and mark plans directly.
pub fn planning_registry(planning: Arc<PlanningTool>) -> ToolRegistry {
    ToolRegistry::new()
        .with(planning)
        .with(Arc::new(TerminateTool::new()))
}

/// Session options for a bash tool rooted in the configured workspace.
pub fn session_options(config: &AppConfig) -> SessionOptions {
    SessionOptions {
        working_dir: Some(config.workspace_dir()),
        ..SessionOptions::from(&config.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_registry_has_terminate() {
        let registry = general_registry(&AppConfig::default());
        assert_eq!(
            registry.names(),
            vec!["python_execute", "str_replace_editor", "file_saver", "terminate"]
        );
    }

    #[test]
    fn swe_registry_shares_bash() {
        let bash = Arc::new(BashTool::default());
        let registry = swe_registry(bash.clone());
        assert!(registry.contains("bash"));
        assert_eq!(Arc::strong_count(&bash), 2);
    }

    #[test]
    fn planning_registry_exposes_schema() {
        let registry = planning_registry(Arc::new(PlanningTool::new()));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "planning");
        assert_eq!(defs[0].parameters["required"], serde_json::json!(["command"]));
    }
}
