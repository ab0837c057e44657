//! Planning agent: a tool-calling agent that keeps a plan up to date.
//!
//! A run starts by asking the oracle to create a plan for the request.
//! Before every think the current plan is shown to the oracle and the first
//! open step is marked in progress. When a step's tool call has been acted
//! on, that step is marked completed. Plan bookkeeping never fails a run;
//! problems are logged and the loop carries on.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use taskloom_core::event::DomainEvent;
use taskloom_core::message::Message;
use taskloom_core::provider::ToolChoice;
use taskloom_core::{AgentState, Error, Result};
use taskloom_tools::planning::{self, PlanningTool, StepStatus};
use tracing::{debug, info, warn};

use crate::base::{Agent, AgentCore, run_steps};
use crate::toolcall::ToolCallAgent;

/// Shown in place of the plan before one exists.
pub const NO_ACTIVE_PLAN: &str = "No active plan. Please create a plan first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Pending,
    Completed,
}

/// A tool call attributed to a plan step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCall {
    pub step_index: usize,
    pub tool_name: String,
    pub status: CallStatus,
    pub result: Option<String>,
}

/// Maps tool call ids to the plan step they were made for.
///
/// Entries are never removed or re-keyed; a call id tracked twice keeps its
/// first step.
#[derive(Debug, Default)]
pub struct StepExecutionTracker {
    calls: HashMap<String, TrackedCall>,
}

impl StepExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a call. Returns `false` if the id is already known.
    pub fn track(
        &mut self,
        call_id: impl Into<String>,
        step_index: usize,
        tool_name: impl Into<String>,
    ) -> bool {
        let call_id = call_id.into();
        if self.calls.contains_key(&call_id) {
            return false;
        }
        self.calls.insert(
            call_id,
            TrackedCall {
                step_index,
                tool_name: tool_name.into(),
                status: CallStatus::Pending,
                result: None,
            },
        );
        true
    }

    /// Record the result of a tracked call.
    pub fn complete(&mut self, call_id: &str, result: impl Into<String>) -> Option<&TrackedCall> {
        let call = self.calls.get_mut(call_id)?;
        call.status = CallStatus::Completed;
        call.result = Some(result.into());
        Some(call)
    }

    pub fn get(&self, call_id: &str) -> Option<&TrackedCall> {
        self.calls.get(call_id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

pub struct PlanningAgent {
    inner: ToolCallAgent,
    planning: Arc<PlanningTool>,
    /// Id proposed to the oracle when the initial plan is created.
    plan_id: String,
    active_plan_id: Option<String>,
    tracker: StepExecutionTracker,
    current_step_index: Option<usize>,
}

impl PlanningAgent {
    /// Wrap `core`, registering `planning` with it if it isn't already.
    pub fn new(mut core: AgentCore, planning: Arc<PlanningTool>) -> Self {
        core.register_tool(planning.clone());
        Self {
            inner: ToolCallAgent::new(core),
            planning,
            plan_id: format!("plan_{}", Utc::now().timestamp_millis()),
            active_plan_id: None,
            tracker: StepExecutionTracker::new(),
            current_step_index: None,
        }
    }

    pub fn active_plan_id(&self) -> Option<&str> {
        self.active_plan_id.as_deref()
    }

    /// Index of the step being worked on, as of the last think.
    pub fn current_step_index(&self) -> Option<usize> {
        self.current_step_index
    }

    pub fn tracker(&self) -> &StepExecutionTracker {
        &self.tracker
    }

    pub fn planning_tool(&self) -> &Arc<PlanningTool> {
        &self.planning
    }

    /// The active plan in its text form.
    pub fn get_plan(&self) -> String {
        let Some(id) = &self.active_plan_id else {
            return NO_ACTIVE_PLAN.to_string();
        };
        self.planning
            .render(id)
            .unwrap_or_else(|e| format!("Error: {e}"))
    }

    /// Ask the oracle to plan `request` and execute the first planning call
    /// it makes.
    pub async fn create_initial_plan(&mut self, request: &str) -> Result<()> {
        info!(plan_id = %self.plan_id, "Creating initial plan");
        let prompt = Message::user(format!(
            "Analyze the request and create a plan with ID {}: {request}",
            self.plan_id
        ));

        let core = self.inner.core_mut();
        core.memory.append(prompt.clone());
        let response = core.ask(vec![prompt], ToolChoice::Auto).await?;
        core.memory.append(Message::assistant_with_tool_calls(
            response.content.filter(|c| !c.is_empty()),
            response.tool_calls.clone(),
        ));

        let planning_call = response
            .tool_calls
            .iter()
            .find(|call| call.name == planning::NAME);
        match planning_call {
            Some(call) => {
                let dispatched = core
                    .dispatcher()
                    .dispatch(core.tools(), call, core.events())
                    .await;
                core.memory.append(Message::tool(
                    dispatched.observation,
                    dispatched.tool_name,
                    dispatched.call_id,
                ));
            }
            None => {
                warn!("No plan created from initial request");
                core.memory.append(Message::assistant(
                    "Error: Parameter `plan_id` is required for command: create",
                ));
            }
        }

        self.active_plan_id = self.planning.active_plan_id();
        match &self.active_plan_id {
            Some(id) => info!(plan_id = %id, "Initial plan created"),
            None => warn!("Planning tool has no active plan after creation"),
        }
        Ok(())
    }

    /// Find the step to work on next and mark it in progress.
    fn advance_plan(&mut self, rendered: &str) {
        self.current_step_index = current_step_index(rendered);
        let (Some(id), Some(index)) = (&self.active_plan_id, self.current_step_index) else {
            return;
        };
        match self
            .planning
            .mark_step(id, index, StepStatus::InProgress, None)
        {
            Ok(_) => debug!(plan_id = %id, step_index = index, "Plan step in progress"),
            Err(e) => warn!(plan_id = %id, step_index = index, error = %e, "Could not mark plan step"),
        }
    }

    /// Attribute the first tool call of the latest think to the current step.
    fn track_selected_call(&mut self) {
        let Some(step_index) = self.current_step_index else {
            return;
        };
        let Some(call) = self.inner.tool_calls().first() else {
            return;
        };
        if call.name == planning::NAME || self.inner.core().dispatcher().is_special(&call.name) {
            return;
        }
        if self.tracker.track(call.id.clone(), step_index, call.name.clone()) {
            debug!(call_id = %call.id, tool = %call.name, step_index, "Tracking tool call");
        }
    }

    fn complete_step(&mut self, call_id: &str, result: &str) {
        let Some(tracked) = self.tracker.complete(call_id, result) else {
            warn!(call_id, "No step tracking found for tool call");
            return;
        };
        let step_index = tracked.step_index;
        let Some(id) = self.active_plan_id.clone() else {
            warn!(call_id, step_index, "No active plan to update");
            return;
        };
        match self
            .planning
            .mark_step(&id, step_index, StepStatus::Completed, None)
        {
            Ok(_) => {
                info!(plan_id = %id, step_index, "Marked plan step completed");
                self.inner.core().publish(DomainEvent::PlanStepMarked {
                    plan_id: id,
                    step_index,
                    status: StepStatus::Completed.as_str().to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => warn!(plan_id = %id, step_index, error = %e, "Failed to update plan status"),
        }
    }
}

/// Index of the first not-started or in-progress step in a rendered plan.
fn current_step_index(rendered: &str) -> Option<usize> {
    let mut lines = rendered.lines();
    lines.by_ref().find(|line| line.trim() == "Steps:")?;
    lines.find_map(|line| {
        let (index, rest) = line.split_once(". ")?;
        let index = index.trim().parse::<usize>().ok()?;
        let open = rest.starts_with(StepStatus::NotStarted.symbol())
            || rest.starts_with(StepStatus::InProgress.symbol());
        open.then_some(index)
    })
}

#[async_trait]
impl Agent for PlanningAgent {
    fn core(&self) -> &AgentCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        self.inner.core_mut()
    }

    async fn think(&mut self) -> Result<bool> {
        self.active_plan_id = self.planning.active_plan_id();

        let status = self.active_plan_id.is_some().then(|| self.get_plan());
        let original = match &status {
            Some(plan) => {
                let core = self.inner.core_mut();
                let prompt = format!(
                    "CURRENT PLAN STATUS:\n{plan}\n\n{}",
                    core.next_step_prompt.as_deref().unwrap_or("")
                );
                Some(std::mem::replace(&mut core.next_step_prompt, Some(prompt)))
            }
            None => None,
        };
        if let Some(plan) = &status {
            self.advance_plan(plan);
        }

        let outcome = self.inner.think().await;
        if let Some(prompt) = original {
            self.inner.core_mut().next_step_prompt = prompt;
        }
        let acting = outcome?;

        self.track_selected_call();
        Ok(acting)
    }

    async fn act(&mut self) -> Result<String> {
        let result = self.inner.act().await?;
        if let Some(call_id) = self.inner.tool_calls().first().map(|c| c.id.clone()) {
            self.complete_step(&call_id, &result);
        }
        Ok(result)
    }

    async fn run(&mut self, request: Option<String>) -> Result<String> {
        let state = self.core().state();
        if state != AgentState::Idle {
            return Err(Error::InvalidState(state));
        }

        if let Some(request) = request.filter(|r| !r.is_empty())
            && let Err(e) = self.create_initial_plan(&request).await
        {
            warn!(error = %e, "Initial planning failed");
            self.core().set_state(AgentState::Error);
            self.core().tools().cleanup_all().await;
            return Err(e);
        }

        run_steps(self, None).await
    }
}
