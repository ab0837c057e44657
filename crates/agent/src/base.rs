//! The step loop at the heart of taskloom.
//!
//! An agent repeatedly **thinks** (asks the oracle what to do, given its
//! memory and the registered tools) and **acts** (dispatches the chosen tool
//! calls). Each think/act pair is one step. The loop ends when:
//!
//! 1. a special tool such as `terminate` completes (state `Finished`),
//! 2. the step budget runs out (state `Finished`, not an error), or
//! 3. something unrecoverable happens, e.g. the oracle fails (state `Error`,
//!    the error is returned to the caller).
//!
//! Every run ends with tool cleanup, however it ends.
//!
//! [`AgentCore`] holds the state every agent shares. The [`Agent`] trait
//! supplies the loop; implementors provide `think` and `act`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use taskloom_config::AppConfig;
use taskloom_core::agent::{AgentState, AgentStatus};
use taskloom_core::event::{DomainEvent, EventBus};
use taskloom_core::memory::{DEFAULT_MAX_MESSAGES, Memory};
use taskloom_core::message::{Message, Role};
use taskloom_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice};
use taskloom_core::tool::{Tool, ToolRegistry};
use taskloom_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::prompt::STUCK_PROMPT;

/// Step result when the oracle chose no action.
pub const NO_ACTION: &str = "Thinking complete - no action needed";

/// Run summary when the loop never stepped.
pub const NO_STEPS: &str = "No steps executed";

/// State shared by every agent: identity, memory, oracle, tools, budgets.
pub struct AgentCore {
    status: Arc<AgentStatus>,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
    duplicate_threshold: usize,
    tool_choice: ToolChoice,
    tools: ToolRegistry,
    dispatcher: Dispatcher,
    events: Option<EventBus>,

    /// Conversation log sent to the oracle.
    pub memory: Memory,

    /// Sent as a system message ahead of memory on every oracle call.
    pub system_prompt: Option<String>,

    /// Appended to memory as a user message before every think.
    pub next_step_prompt: Option<String>,
}

impl AgentCore {
    /// Create a core and hand every registered tool a weak reference to the
    /// agent's status.
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: ToolRegistry,
    ) -> Self {
        let status = AgentStatus::new(name);
        tools.bind_agent(&status);
        Self {
            status,
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            max_steps: 10,
            duplicate_threshold: 2,
            tool_choice: ToolChoice::Auto,
            tools,
            dispatcher: Dispatcher::new(),
            events: None,
            memory: Memory::new(DEFAULT_MAX_MESSAGES),
            system_prompt: None,
            next_step_prompt: None,
        }
    }

    /// Create a core with oracle settings and budgets taken from `config`.
    pub fn from_config(
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        config: &AppConfig,
    ) -> Self {
        let mut core = Self::new(name, provider, config.model.clone(), tools)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_steps(config.agent.max_steps)
            .with_duplicate_threshold(config.agent.duplicate_threshold);
        core.memory = Memory::new(config.agent.max_messages);
        core.dispatcher = core.dispatcher.with_max_observe(config.agent.max_observe);
        core
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the step budget.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_duplicate_threshold(mut self, threshold: usize) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = Some(prompt.into());
        self
    }

    /// Publish state changes, steps and tool executions on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn name(&self) -> &str {
        self.status.name()
    }

    pub fn status(&self) -> &Arc<AgentStatus> {
        &self.status
    }

    pub fn state(&self) -> AgentState {
        self.status.state()
    }

    pub fn current_step(&self) -> u32 {
        self.status.current_step()
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn tool_choice(&self) -> ToolChoice {
        self.tool_choice
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn events(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    /// Add (or replace) a tool after construction.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        tool.bind_agent(Arc::downgrade(&self.status));
        self.tools.register(tool);
    }

    pub fn set_state(&self, to: AgentState) {
        let from = self.status.state();
        if from == to {
            return;
        }
        self.status.set_state(to);
        debug!(agent = self.name(), %from, %to, "Agent state changed");
        self.publish(DomainEvent::StateChanged {
            agent: self.name().to_string(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    pub fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Return to `Idle` so the agent can run again. Memory is kept.
    pub fn reset(&self) {
        self.set_state(AgentState::Idle);
        self.status.set_current_step(0);
    }

    /// Ask the oracle about `messages`, offering every registered tool.
    pub async fn ask(&self, messages: Vec<Message>, choice: ToolChoice) -> Result<ProviderResponse> {
        let mut request = ProviderRequest::new(self.model.clone(), messages);
        request.system_messages = self
            .system_prompt
            .iter()
            .filter(|p| !p.is_empty())
            .map(Message::system)
            .collect();
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.tools = self.tools.definitions();
        request.tool_choice = choice;

        let response = self.provider.complete(request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                total_tokens = usage.total_tokens,
                "Oracle responded"
            );
        }
        Ok(response)
    }

    /// True when the latest message's content was already produced by at
    /// least `duplicate_threshold` earlier assistant messages.
    pub fn is_stuck(&self) -> bool {
        let messages = self.memory.messages();
        let Some((last, earlier)) = messages.split_last() else {
            return false;
        };
        let Some(content) = last.content.as_deref().filter(|c| !c.is_empty()) else {
            return false;
        };
        let duplicates = earlier
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content.as_deref() == Some(content))
            .count();
        duplicates >= self.duplicate_threshold
    }

    /// Nudge the oracle towards a different approach.
    pub fn handle_stuck_state(&mut self) {
        let current = self.next_step_prompt.take().unwrap_or_default();
        if current.starts_with(STUCK_PROMPT) {
            self.next_step_prompt = Some(current);
            return;
        }
        warn!(agent = self.name(), "Agent detected stuck state, adding strategy prompt");
        self.next_step_prompt = Some(format!("{STUCK_PROMPT}\n{current}"));
    }
}

/// A think/act agent driven by the step loop.
#[async_trait]
pub trait Agent: Send {
    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    /// Decide what to do next. Returns whether there is an action to take.
    async fn think(&mut self) -> Result<bool>;

    /// Carry out the action chosen by `think`.
    async fn act(&mut self) -> Result<String>;

    /// One think/act iteration.
    async fn step(&mut self) -> Result<String> {
        if !self.think().await? {
            return Ok(NO_ACTION.to_string());
        }
        self.act().await
    }

    /// Run the loop until it finishes, appending `request` as a user
    /// message first. Only allowed from `Idle`.
    async fn run(&mut self, request: Option<String>) -> Result<String> {
        run_steps(self, request).await
    }

    /// [`Agent::run`] bounded by a wall-clock timeout. On expiry the agent
    /// is left in `Error` and its tools are cleaned up.
    async fn run_with_timeout(
        &mut self,
        request: Option<String>,
        timeout: Duration,
    ) -> Result<String> {
        let outcome = tokio::time::timeout(timeout, self.run(request)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    agent = self.core().name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Agent run timed out"
                );
                self.core().set_state(AgentState::Error);
                self.core().tools().cleanup_all().await;
                Err(Error::Timeout { timeout })
            }
        }
    }
}

/// The step loop behind [`Agent::run`].
///
/// Agents that override `run` (to do work before the first step) call this
/// to enter the loop.
pub async fn run_steps<A: Agent + ?Sized>(agent: &mut A, request: Option<String>) -> Result<String> {
    let state = agent.core().state();
    if state != AgentState::Idle {
        return Err(Error::InvalidState(state));
    }

    if let Some(request) = request.filter(|r| !r.is_empty()) {
        agent.core_mut().memory.append(Message::user(request));
    }

    agent.core().status().set_current_step(0);
    agent.core().set_state(AgentState::Running);

    let outcome = drive(agent).await;
    agent.core().tools().cleanup_all().await;

    match outcome {
        Ok(results) if results.is_empty() => Ok(NO_STEPS.to_string()),
        Ok(results) => Ok(results.join("\n")),
        Err(e) => {
            warn!(agent = agent.core().name(), error = %e, "Agent run failed");
            agent.core().set_state(AgentState::Error);
            Err(e)
        }
    }
}

async fn drive<A: Agent + ?Sized>(agent: &mut A) -> Result<Vec<String>> {
    let max_steps = agent.core().max_steps();
    let mut results = Vec::new();

    while agent.core().current_step() < max_steps && agent.core().state() != AgentState::Finished {
        let step = agent.core().current_step() + 1;
        agent.core().status().set_current_step(step);
        info!(agent = agent.core().name(), step, max_steps, "Executing step");

        let result = agent.step().await?;

        if agent.core().is_stuck() {
            agent.core_mut().handle_stuck_state();
        }

        agent.core().publish(DomainEvent::StepCompleted {
            agent: agent.core().name().to_string(),
            step,
            summary: result.clone(),
            timestamp: Utc::now(),
        });
        results.push(format!("Step {step}: {result}"));
    }

    if agent.core().state() != AgentState::Finished {
        info!(agent = agent.core().name(), max_steps, "Step budget exhausted");
        results.push(format!("Terminated: Reached max steps ({max_steps})"));
        agent.core().set_state(AgentState::Finished);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts steps; finishes itself after `finish_after` steps when set.
    struct Scripted {
        core: AgentCore,
        finish_after: Option<u32>,
        thoughts: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(max_steps: u32, finish_after: Option<u32>) -> Self {
            let core = AgentCore::new(
                "scripted",
                Arc::new(FailingProvider),
                "mock-model",
                ToolRegistry::new(),
            )
            .with_max_steps(max_steps);
            Self {
                core,
                finish_after,
                thoughts: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Agent for Scripted {
        fn core(&self) -> &AgentCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut AgentCore {
            &mut self.core
        }
        async fn think(&mut self) -> Result<bool> {
            let n = self.thoughts.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            Ok(n % 2 == 0)
        }
        async fn act(&mut self) -> Result<String> {
            if self.finish_after == Some(self.core.current_step()) {
                self.core.set_state(AgentState::Finished);
            }
            Ok("acted".into())
        }
    }

    #[tokio::test]
    async fn budget_exhaustion_finishes_without_error() {
        let mut agent = Scripted::new(3, None);
        let summary = agent.run(Some("go".into())).await.unwrap();
        assert_eq!(
            summary,
            "Step 1: Thinking complete - no action needed\n\
             Step 2: acted\n\
             Step 3: Thinking complete - no action needed\n\
             Terminated: Reached max steps (3)"
        );
        assert_eq!(agent.core.state(), AgentState::Finished);
        assert_eq!(agent.thoughts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn finishing_stops_the_loop_early() {
        let mut agent = Scripted::new(10, Some(2));
        let summary = agent.run(None).await.unwrap();
        assert_eq!(agent.core.current_step(), 2);
        assert!(!summary.contains("Terminated"));
    }

    #[tokio::test]
    async fn zero_budget_terminates_immediately() {
        let mut agent = Scripted::new(0, None);
        let result = run_steps(&mut agent, None).await.unwrap();
        assert_eq!(result, "Terminated: Reached max steps (0)");
    }

    #[tokio::test]
    async fn run_requires_idle() {
        let mut agent = Scripted::new(1, None);
        agent.run(None).await.unwrap();
        let err = agent.run(None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(AgentState::Finished)));

        agent.core.reset();
        assert!(agent.run(None).await.is_ok());
    }

    #[tokio::test]
    async fn request_is_recorded_as_user_message() {
        let mut agent = Scripted::new(1, None);
        agent.run(Some("hello".into())).await.unwrap();
        let first = &agent.core.memory.messages()[0];
        assert_eq!(first.role, Role::User);
        assert_eq!(first.text(), "hello");
    }

    #[test]
    fn stuck_detection_counts_earlier_assistant_duplicates() {
        let mut core = AgentCore::new(
            "s",
            Arc::new(FailingProvider),
            "m",
            ToolRegistry::new(),
        )
        .with_next_step_prompt("next");
        core.memory.append(Message::assistant("same"));
        core.memory.append(Message::user("nudge"));
        core.memory.append(Message::assistant("same"));
        assert!(!core.is_stuck());
        core.memory.append(Message::assistant("same"));
        assert!(core.is_stuck());

        core.handle_stuck_state();
        core.handle_stuck_state();
        assert_eq!(
            core.next_step_prompt.as_deref(),
            Some(format!("{STUCK_PROMPT}\nnext").as_str())
        );
    }

    #[tokio::test]
    async fn state_changes_are_published() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let mut agent = Scripted::new(1, None);
        agent.core = AgentCore::new("scripted", Arc::new(FailingProvider), "m", ToolRegistry::new())
            .with_max_steps(1)
            .with_event_bus(bus);
        agent.run(None).await.unwrap();

        let mut transitions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::StateChanged { from, to, .. } = &*event {
                transitions.push((*from, *to));
            }
        }
        assert_eq!(
            transitions,
            vec![
                (AgentState::Idle, AgentState::Running),
                (AgentState::Running, AgentState::Finished)
            ]
        );
    }
}
