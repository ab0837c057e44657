//! Planning tool: named plans with per-step status and notes.
//!
//! A plan is an ordered checklist. Each step carries a status
//! (`not_started`, `in_progress`, `completed`, `blocked`) and free-form
//! notes. The store keeps plans in creation order and tracks at most one
//! active plan, which `get` and `mark_step` fall back to when no id is given.
//!
//! Plans render to a fixed text layout that the planning agent parses
//! back to find the next step to work on:
//!
//! ```text
//! Plan: Trip (ID: plan_1)
//! ========================
//!
//! Progress: 1/2 steps completed (50.0%)
//! Status: 1 completed, 0 in progress, 0 blocked, 1 not started
//!
//! Steps:
//! 0. [✓] book flight
//! 1. [ ] book hotel
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use taskloom_core::error::{PlanError, ToolError};
use taskloom_core::tool::{Tool, ToolResult};

pub const NAME: &str = "planning";

const DESCRIPTION: &str = "A planning tool that allows the agent to create and manage plans for solving complex tasks.
The tool provides functionality for creating plans, updating plan steps, and tracking progress.";

const COMMANDS: [&str; 7] = [
    "create",
    "update",
    "list",
    "get",
    "set_active",
    "mark_step",
    "delete",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl StepStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
            StepStatus::Blocked => "[!]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Blocked => "blocked",
        }
    }
}

impl FromStr for StepStatus {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(StepStatus::NotStarted),
            "in_progress" => Ok(StepStatus::InProgress),
            "completed" => Ok(StepStatus::Completed),
            "blocked" => Ok(StepStatus::Blocked),
            other => Err(PlanError::InvalidStepStatus(other.to_string())),
        }
    }
}

/// A single plan. The three step vectors always have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub title: String,
    steps: Vec<String>,
    step_statuses: Vec<StepStatus>,
    step_notes: Vec<String>,
}

impl Plan {
    fn new(plan_id: String, title: String, steps: Vec<String>) -> Self {
        let n = steps.len();
        Self {
            plan_id,
            title,
            steps,
            step_statuses: vec![StepStatus::NotStarted; n],
            step_notes: vec![String::new(); n],
        }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn step_statuses(&self) -> &[StepStatus] {
        &self.step_statuses
    }

    pub fn step_notes(&self) -> &[String] {
        &self.step_notes
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.step_statuses.iter().filter(|s| **s == status).count()
    }

    /// Replace the step list. A step keeps its status and notes when the
    /// same text sits at the same position in the old list.
    fn replace_steps(&mut self, steps: Vec<String>) {
        let mut statuses = Vec::with_capacity(steps.len());
        let mut notes = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if self.steps.get(i) == Some(step) {
                statuses.push(self.step_statuses[i]);
                notes.push(std::mem::take(&mut self.step_notes[i]));
            } else {
                statuses.push(StepStatus::NotStarted);
                notes.push(String::new());
            }
        }
        self.steps = steps;
        self.step_statuses = statuses;
        self.step_notes = notes;
    }

    /// Render the plan in its canonical text form.
    pub fn render(&self) -> String {
        let header = format!("Plan: {} (ID: {})\n", self.title, self.plan_id);
        let mut out = header.clone();
        out.push_str(&"=".repeat(header.chars().count()));
        out.push_str("\n\n");

        let total = self.steps.len();
        let completed = self.count(StepStatus::Completed);
        let _ = write!(out, "Progress: {completed}/{total} steps completed ");
        if total > 0 {
            let pct = completed as f64 / total as f64 * 100.0;
            let _ = writeln!(out, "({pct:.1}%)");
        } else {
            out.push_str("(0%)\n");
        }

        let _ = writeln!(
            out,
            "Status: {completed} completed, {} in progress, {} blocked, {} not started\n",
            self.count(StepStatus::InProgress),
            self.count(StepStatus::Blocked),
            self.count(StepStatus::NotStarted),
        );
        out.push_str("Steps:\n");

        for (i, ((step, status), notes)) in self
            .steps
            .iter()
            .zip(&self.step_statuses)
            .zip(&self.step_notes)
            .enumerate()
        {
            let _ = writeln!(out, "{i}. {} {step}", status.symbol());
            if !notes.is_empty() {
                let _ = writeln!(out, "   Notes: {notes}");
            }
        }
        out
    }
}

/// One decoded planning command.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlanCommand {
    Create {
        #[serde(default)]
        plan_id: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        steps: Option<Vec<String>>,
    },
    Update {
        #[serde(default)]
        plan_id: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        steps: Option<Vec<String>>,
    },
    List,
    Get {
        #[serde(default)]
        plan_id: Option<String>,
    },
    SetActive {
        #[serde(default)]
        plan_id: Option<String>,
    },
    MarkStep {
        #[serde(default)]
        plan_id: Option<String>,
        #[serde(default)]
        step_index: Option<i64>,
        #[serde(default)]
        step_status: Option<String>,
        #[serde(default)]
        step_notes: Option<String>,
    },
    Delete {
        #[serde(default)]
        plan_id: Option<String>,
    },
}

impl PlanCommand {
    /// Decode tool arguments. Unknown commands get their own error so the
    /// oracle sees the list of valid ones.
    pub fn from_arguments(arguments: serde_json::Value) -> Result<Self, ToolError> {
        let command = arguments
            .get("command")
            .and_then(|c| c.as_str())
            .map(str::to_string);
        match command {
            None => Err(ToolError::InvalidArguments(
                "Parameter `command` is required".into(),
            )),
            Some(c) if !COMMANDS.contains(&c.as_str()) => {
                Err(PlanError::UnknownCommand(c).into())
            }
            Some(_) => serde_json::from_value(arguments)
                .map_err(|e| ToolError::InvalidArguments(e.to_string())),
        }
    }
}

fn required(
    value: Option<String>,
    param: &'static str,
    command: &'static str,
) -> Result<String, PlanError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(PlanError::MissingParameter { param, command })
}

/// All plans owned by one planning tool, plus the active plan id.
#[derive(Debug, Default)]
pub struct PlanStore {
    plans: Vec<Plan>,
    active: Option<String>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_plan_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.plan_id == plan_id)
    }

    fn get_mut(&mut self, plan_id: &str) -> Option<&mut Plan> {
        self.plans.iter_mut().find(|p| p.plan_id == plan_id)
    }

    fn resolve(&self, plan_id: Option<String>) -> Result<String, PlanError> {
        let id = match plan_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => self.active.clone().ok_or(PlanError::NoActivePlan)?,
        };
        if self.get(&id).is_none() {
            return Err(PlanError::NotFound(id));
        }
        Ok(id)
    }

    /// Apply one command and return the text shown to the oracle.
    pub fn apply(&mut self, command: PlanCommand) -> Result<String, PlanError> {
        match command {
            PlanCommand::Create {
                plan_id,
                title,
                steps,
            } => self.create(plan_id, title, steps),
            PlanCommand::Update {
                plan_id,
                title,
                steps,
            } => self.update(plan_id, title, steps),
            PlanCommand::List => Ok(self.list()),
            PlanCommand::Get { plan_id } => {
                let id = self.resolve(plan_id)?;
                self.render(&id)
            }
            PlanCommand::SetActive { plan_id } => {
                let id = required(plan_id, "plan_id", "set_active")?;
                let rendered = self.render(&id)?;
                self.active = Some(id.clone());
                Ok(format!("Plan '{id}' is now the active plan.\n\n{rendered}"))
            }
            PlanCommand::MarkStep {
                plan_id,
                step_index,
                step_status,
                step_notes,
            } => {
                let id = self.resolve(plan_id)?;
                let index = step_index.ok_or(PlanError::MissingParameter {
                    param: "step_index",
                    command: "mark_step",
                })?;
                let status = step_status
                    .filter(|s| !s.is_empty())
                    .map(|s| s.parse::<StepStatus>())
                    .transpose()?;
                self.mark_step(&id, index, status, step_notes)
            }
            PlanCommand::Delete { plan_id } => self.delete(plan_id),
        }
    }

    pub fn create(
        &mut self,
        plan_id: Option<String>,
        title: Option<String>,
        steps: Option<Vec<String>>,
    ) -> Result<String, PlanError> {
        let id = required(plan_id, "plan_id", "create")?;
        if self.get(&id).is_some() {
            return Err(PlanError::AlreadyExists(id));
        }
        let title = required(title, "title", "create")?;
        let steps = steps
            .filter(|s| !s.is_empty())
            .ok_or(PlanError::InvalidSteps("create"))?;

        let plan = Plan::new(id.clone(), title, steps);
        let rendered = plan.render();
        self.plans.push(plan);
        self.active = Some(id.clone());
        Ok(format!(
            "Plan created successfully with ID: {id}\n\n{rendered}"
        ))
    }

    fn update(
        &mut self,
        plan_id: Option<String>,
        title: Option<String>,
        steps: Option<Vec<String>>,
    ) -> Result<String, PlanError> {
        let id = required(plan_id, "plan_id", "update")?;
        let plan = self
            .get_mut(&id)
            .ok_or_else(|| PlanError::NotFound(id.clone()))?;
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            plan.title = title;
        }
        if let Some(steps) = steps.filter(|s| !s.is_empty()) {
            plan.replace_steps(steps);
        }
        Ok(format!(
            "Plan updated successfully: {id}\n\n{}",
            plan.render()
        ))
    }

    fn list(&self) -> String {
        if self.plans.is_empty() {
            return "No plans available. Create a plan with the 'create' command.".into();
        }
        let mut out = String::from("Available plans:\n");
        for plan in &self.plans {
            let marker = if self.active.as_deref() == Some(plan.plan_id.as_str()) {
                " (active)"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "• {}{marker}: {} - {}/{} steps completed",
                plan.plan_id,
                plan.title,
                plan.count(StepStatus::Completed),
                plan.steps.len()
            );
        }
        out
    }

    /// Render a plan by id.
    pub fn render(&self, plan_id: &str) -> Result<String, PlanError> {
        self.get(plan_id)
            .map(Plan::render)
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))
    }

    /// Set a step's status and/or notes. Out-of-range indices leave the
    /// plan untouched.
    pub fn mark_step(
        &mut self,
        plan_id: &str,
        index: i64,
        status: Option<StepStatus>,
        notes: Option<String>,
    ) -> Result<String, PlanError> {
        let plan = self
            .get_mut(plan_id)
            .ok_or_else(|| PlanError::NotFound(plan_id.to_string()))?;
        let len = plan.steps.len();
        let i = usize::try_from(index)
            .ok()
            .filter(|i| *i < len)
            .ok_or(PlanError::InvalidStepIndex {
                index,
                last: len as i64 - 1,
            })?;

        if let Some(status) = status {
            plan.step_statuses[i] = status;
        }
        if let Some(notes) = notes.filter(|n| !n.is_empty()) {
            plan.step_notes[i] = notes;
        }
        Ok(format!(
            "Step {index} updated in plan '{plan_id}'.\n\n{}",
            plan.render()
        ))
    }

    fn delete(&mut self, plan_id: Option<String>) -> Result<String, PlanError> {
        let id = required(plan_id, "plan_id", "delete")?;
        let pos = self
            .plans
            .iter()
            .position(|p| p.plan_id == id)
            .ok_or_else(|| PlanError::NotFound(id.clone()))?;
        self.plans.remove(pos);
        if self.active.as_deref() == Some(id.as_str()) {
            self.active = None;
        }
        Ok(format!("Plan '{id}' has been deleted."))
    }
}

/// The `planning` tool: a [`PlanStore`] behind a lock.
#[derive(Default)]
pub struct PlanningTool {
    store: Mutex<PlanStore>,
}

impl PlanningTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut PlanStore) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    pub fn active_plan_id(&self) -> Option<String> {
        self.with_store(|s| s.active_plan_id().map(str::to_string))
    }

    pub fn plan(&self, plan_id: &str) -> Option<Plan> {
        self.with_store(|s| s.get(plan_id).cloned())
    }

    pub fn render(&self, plan_id: &str) -> Result<String, PlanError> {
        self.with_store(|s| s.render(plan_id))
    }

    pub fn mark_step(
        &self,
        plan_id: &str,
        index: usize,
        status: StepStatus,
        notes: Option<String>,
    ) -> Result<String, PlanError> {
        self.with_store(|s| s.mark_step(plan_id, index as i64, Some(status), notes))
    }

    pub fn apply(&self, command: PlanCommand) -> Result<String, PlanError> {
        self.with_store(|s| s.apply(command))
    }
}

#[async_trait]
impl Tool for PlanningTool {
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
                "command": {
                    "description": "The command to execute. Available commands: create, update, list, get, set_active, mark_step, delete.",
                    "enum": COMMANDS,
                    "type": "string"
                },
                "plan_id": {
                    "description": "Unique identifier for the plan. Required for create, update, set_active, and delete commands. Optional for get and mark_step (uses active plan if not specified).",
                    "type": "string"
                },
                "title": {
                    "description": "Title for the plan. Required for create command, optional for update command.",
                    "type": "string"
                },
                "steps": {
                    "description": "List of plan steps. Required for create command, optional for update command.",
                    "type": "array",
                    "items": {"type": "string"}
                },
                "step_index": {
                    "description": "Index of the step to update (0-based). Required for mark_step command.",
                    "type": "integer"
                },
                "step_status": {
                    "description": "Status to set for a step. Used with mark_step command.",
                    "enum": ["not_started", "in_progress", "completed", "blocked"],
                    "type": "string"
                },
                "step_notes": {
                    "description": "Additional notes for a step. Optional for mark_step command.",
                    "type": "string"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = PlanCommand::from_arguments(arguments)?;
        let output = self.apply(command)?;
        Ok(ToolResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(id: &str, steps: &[&str]) -> PlanStore {
        let mut store = PlanStore::new();
        store
            .create(
                Some(id.into()),
                Some("Trip".into()),
                Some(steps.iter().map(|s| s.to_string()).collect()),
            )
            .unwrap();
        store
    }

    #[test]
    fn create_renders_and_activates() {
        let mut store = PlanStore::new();
        let out = store
            .create(
                Some("p1".into()),
                Some("Trip".into()),
                Some(vec!["a".into(), "b".into()]),
            )
            .unwrap();
        assert!(out.starts_with("Plan created successfully with ID: p1\n\n"));
        assert!(out.contains("Progress: 0/2 steps completed (0.0%)"));
        assert_eq!(store.active_plan_id(), Some("p1"));
    }

    #[test]
    fn render_layout_is_exact() {
        let mut store = store_with("plan_1", &["book flight", "book hotel"]);
        store
            .mark_step("plan_1", 0, Some(StepStatus::Completed), None)
            .unwrap();
        store
            .mark_step("plan_1", 1, None, Some("check reviews".into()))
            .unwrap();
        let expected = "Plan: Trip (ID: plan_1)\n\
                        ========================\n\
                        \n\
                        Progress: 1/2 steps completed (50.0%)\n\
                        Status: 1 completed, 0 in progress, 0 blocked, 1 not started\n\
                        \n\
                        Steps:\n\
                        0. [✓] book flight\n\
                        1. [ ] book hotel\n   Notes: check reviews\n";
        assert_eq!(store.render("plan_1").unwrap(), expected);
    }

    #[test]
    fn mark_first_of_two_completed() {
        let mut store = store_with("p", &["a", "b"]);
        let out = store
            .mark_step("p", 0, Some(StepStatus::Completed), None)
            .unwrap();
        assert!(out.contains("1/2 steps completed (50.0%)"));
        assert!(out.contains("0. [✓] a"));
    }

    #[test]
    fn empty_plan_progress_is_zero_percent() {
        let plan = Plan::new("e".into(), "Empty".into(), vec![]);
        assert!(plan.render().contains("Progress: 0/0 steps completed (0%)"));
    }

    #[test]
    fn status_counts_sum_to_step_count() {
        let mut store = store_with("p", &["a", "b", "c", "d"]);
        store.mark_step("p", 0, Some(StepStatus::Completed), None).unwrap();
        store.mark_step("p", 1, Some(StepStatus::InProgress), None).unwrap();
        store.mark_step("p", 2, Some(StepStatus::Blocked), None).unwrap();
        let plan = store.get("p").unwrap();
        let sum: usize = [
            StepStatus::NotStarted,
            StepStatus::InProgress,
            StepStatus::Completed,
            StepStatus::Blocked,
        ]
        .iter()
        .map(|s| plan.count(*s))
        .sum();
        assert_eq!(sum, plan.steps().len());
        assert_eq!(plan.step_notes().len(), plan.steps().len());
    }

    #[test]
    fn out_of_range_mark_step_does_not_mutate() {
        let mut store = store_with("p", &["a", "b"]);
        let before = store.get("p").unwrap().clone();
        for index in [-1, 2, 99] {
            let err = store
                .mark_step("p", index, Some(StepStatus::Completed), Some("n".into()))
                .unwrap_err();
            assert_eq!(err, PlanError::InvalidStepIndex { index, last: 1 });
        }
        assert_eq!(store.get("p").unwrap(), &before);
    }

    #[test]
    fn create_validation_order() {
        let mut store = store_with("p", &["a"]);
        assert_eq!(
            store.create(None, Some("t".into()), Some(vec!["a".into()])),
            Err(PlanError::MissingParameter {
                param: "plan_id",
                command: "create"
            })
        );
        assert_eq!(
            store.create(Some("p".into()), None, None),
            Err(PlanError::AlreadyExists("p".into()))
        );
        assert_eq!(
            store.create(Some("q".into()), None, Some(vec!["a".into()])),
            Err(PlanError::MissingParameter {
                param: "title",
                command: "create"
            })
        );
        assert_eq!(
            store.create(Some("q".into()), Some("t".into()), Some(vec![])),
            Err(PlanError::InvalidSteps("create"))
        );
    }

    #[test]
    fn update_preserves_matching_steps() {
        let mut store = store_with("p", &["a", "b", "c"]);
        store
            .mark_step("p", 0, Some(StepStatus::Completed), Some("done".into()))
            .unwrap();
        store.mark_step("p", 1, Some(StepStatus::Blocked), None).unwrap();
        store
            .apply(PlanCommand::Update {
                plan_id: Some("p".into()),
                title: Some("Trip v2".into()),
                steps: Some(vec!["a".into(), "x".into(), "c".into(), "d".into()]),
            })
            .unwrap();
        let plan = store.get("p").unwrap();
        assert_eq!(plan.title, "Trip v2");
        assert_eq!(
            plan.step_statuses(),
            &[
                StepStatus::Completed,
                StepStatus::NotStarted,
                StepStatus::NotStarted,
                StepStatus::NotStarted
            ]
        );
        assert_eq!(plan.step_notes()[0], "done");
    }

    #[test]
    fn list_marks_active_plan() {
        let mut store = store_with("p1", &["a"]);
        store
            .create(Some("p2".into()), Some("Other".into()), Some(vec!["x".into()]))
            .unwrap();
        let out = store.apply(PlanCommand::List).unwrap();
        assert!(out.contains("• p1: Trip - 0/1 steps completed"));
        assert!(out.contains("• p2 (active): Other - 0/1 steps completed"));

        assert_eq!(
            PlanStore::new().apply(PlanCommand::List).unwrap(),
            "No plans available. Create a plan with the 'create' command."
        );
    }

    #[test]
    fn delete_active_clears_active_id() {
        let mut store = store_with("p", &["a"]);
        let out = store
            .apply(PlanCommand::Delete {
                plan_id: Some("p".into()),
            })
            .unwrap();
        assert_eq!(out, "Plan 'p' has been deleted.");
        assert_eq!(store.active_plan_id(), None);
        assert_eq!(
            store.apply(PlanCommand::Get { plan_id: None }),
            Err(PlanError::NoActivePlan)
        );
    }

    #[test]
    fn set_active_switches_default_plan() {
        let mut store = store_with("p1", &["a"]);
        store
            .create(Some("p2".into()), Some("Other".into()), Some(vec!["x".into()]))
            .unwrap();
        let out = store
            .apply(PlanCommand::SetActive {
                plan_id: Some("p1".into()),
            })
            .unwrap();
        assert!(out.starts_with("Plan 'p1' is now the active plan."));
        let marked = store
            .apply(PlanCommand::MarkStep {
                plan_id: None,
                step_index: Some(0),
                step_status: Some("in_progress".into()),
                step_notes: None,
            })
            .unwrap();
        assert!(marked.contains("0. [→] a"));
    }

    #[test]
    fn mark_step_validates_status_and_index_presence() {
        let mut store = store_with("p", &["a"]);
        assert_eq!(
            store.apply(PlanCommand::MarkStep {
                plan_id: None,
                step_index: None,
                step_status: Some("completed".into()),
                step_notes: None,
            }),
            Err(PlanError::MissingParameter {
                param: "step_index",
                command: "mark_step"
            })
        );
        assert_eq!(
            store.apply(PlanCommand::MarkStep {
                plan_id: None,
                step_index: Some(0),
                step_status: Some("done-ish".into()),
                step_notes: None,
            }),
            Err(PlanError::InvalidStepStatus("done-ish".into()))
        );
    }

    #[test]
    fn unknown_command_lists_valid_ones() {
        let err = PlanCommand::from_arguments(serde_json::json!({"command": "archive"}))
            .unwrap_err();
        assert!(err.to_string().starts_with("Unrecognized command: archive."));
    }

    #[tokio::test]
    async fn tool_execute_round_trip() {
        let tool = PlanningTool::new();
        let created = tool
            .execute(serde_json::json!({
                "command": "create",
                "plan_id": "trip",
                "title": "Trip",
                "steps": ["book flight", "book hotel"]
            }))
            .await
            .unwrap();
        assert!(created.output.unwrap().contains("0. [ ] book flight"));

        tool.execute(serde_json::json!({
            "command": "mark_step",
            "step_index": 0,
            "step_status": "completed"
        }))
        .await
        .unwrap();
        let got = tool
            .execute(serde_json::json!({"command": "get"}))
            .await
            .unwrap();
        assert!(got.output.unwrap().contains("1/2 steps completed"));

        let missing = tool
            .execute(serde_json::json!({"command": "get", "plan_id": "nope"}))
            .await
            .unwrap_err();
        assert_eq!(missing.to_string(), "No plan found with ID: nope");
    }
}
