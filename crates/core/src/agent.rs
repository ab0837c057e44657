//! Agent state types.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Execution state of an agent.
///
/// `Idle` is initial. A run moves it to `Running`, and from there to
/// `Finished` (terminate tool or step budget) or `Error` (fatal failure).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl AgentState {
    /// Whether a run has ended in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Finished | AgentState::Error)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Shared, observable status of one agent instance.
///
/// The agent owns the only strong reference. Tools that want to know about
/// the agent driving them receive a `Weak<AgentStatus>` at registration, so
/// they never keep the agent alive.
#[derive(Debug)]
pub struct AgentStatus {
    name: String,
    state: Mutex<AgentState>,
    current_step: AtomicU32,
}

impl AgentStatus {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(AgentState::Idle),
            current_step: AtomicU32::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_state(&self, state: AgentState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn current_step(&self) -> u32 {
        self.current_step.load(Ordering::SeqCst)
    }

    pub fn set_current_step(&self, step: u32) {
        self.current_step.store(step, Ordering::SeqCst);
    }
}
