//! Agents for taskloom, built on a think/act step loop.
//!
//! Each step the agent **thinks** (asks the oracle what to do next, offering
//! every registered tool) and **acts** (dispatches the tool calls it chose,
//! recording one observation per call). A run ends when `terminate`
//! completes, when the step budget runs out, or on an unrecoverable error.
//!
//! - [`ToolCallAgent`]: the plain tool-calling agent
//! - [`SweAgent`]: adds the shell's working directory to every prompt
//! - [`PlanningAgent`]: creates a plan up front and tracks step progress
//!
//! [`presets`] wires each of them from an [`taskloom_config::AppConfig`].

pub mod base;
pub mod dispatch;
pub mod planning;
pub mod presets;
pub mod prompt;
pub mod swe;
pub mod toolcall;

#[cfg(test)]
mod test_helpers;

pub use base::{Agent, AgentCore, NO_ACTION, NO_STEPS, run_steps};
pub use dispatch::{Dispatched, Dispatcher};
pub use planning::{CallStatus, PlanningAgent, StepExecutionTracker, TrackedCall};
pub use presets::Preset;
pub use swe::SweAgent;
pub use toolcall::ToolCallAgent;
