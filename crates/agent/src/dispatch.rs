//! Tool-call dispatch with special-tool interception.
//!
//! The dispatcher turns one oracle-proposed [`ToolCall`] into an observation
//! string for memory. Nothing a tool does can fail the loop from here:
//! unknown names, malformed arguments, tool errors and tool panics all come
//! back as text the oracle can read on its next turn.
//!
//! Special tools (by default only `terminate`) get one extra treatment:
//! once they return a non-error result every tool is cleaned up and the
//! dispatch is flagged so the loop can move to `Finished`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::Utc;
use taskloom_core::event::{DomainEvent, EventBus};
use taskloom_core::message::ToolCall;
use taskloom_core::tool::{ToolRegistry, ToolResult};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// A spawned task that is aborted when its handle is dropped, so a
/// cancelled dispatch does not leave the tool running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0).poll(cx)
    }
}

/// What came out of dispatching one tool call.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub call_id: String,
    pub tool_name: String,
    /// The raw result. Dispatch-level failures show up in `error`.
    pub result: ToolResult,
    /// Text recorded in memory, already truncated.
    pub observation: String,
    /// A special tool completed; the run should finish.
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    special_tools: Vec<String>,
    max_observe: Option<usize>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            special_tools: vec![taskloom_tools::terminate::NAME.to_string()],
            max_observe: None,
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap observations at `max` characters.
    pub fn with_max_observe(mut self, max: Option<usize>) -> Self {
        self.max_observe = max;
        self
    }

    /// Replace the set of special tool names.
    pub fn with_special_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_tools = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_special(&self, name: &str) -> bool {
        self.special_tools.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    pub fn max_observe(&self) -> Option<usize> {
        self.max_observe
    }

    /// Execute one tool call against `registry`.
    pub async fn dispatch(
        &self,
        registry: &ToolRegistry,
        call: &ToolCall,
        events: Option<&EventBus>,
    ) -> Dispatched {
        let name = call.name.as_str();
        let outcome = |result: ToolResult, observation: String, finished: bool| Dispatched {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            observation: self.truncate(observation),
            finished,
        };

        if name.is_empty() {
            let result = ToolResult::failure("Invalid command format");
            let text = result.to_string();
            return outcome(result, text, false);
        }

        let Some(tool) = registry.get(name) else {
            warn!(tool = name, "Oracle requested an unknown tool");
            let result = ToolResult::failure(format!("Unknown tool '{name}'"));
            let text = result.to_string();
            return outcome(result, text, false);
        };

        let arguments = match call.parse_arguments() {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool arguments are not valid JSON");
                let message = format!("Error parsing arguments for {name}: Invalid JSON format");
                return outcome(ToolResult::failure(message.clone()), message, false);
            }
        };

        debug!(tool = name, call_id = %call.id, "Executing tool");
        let started = Instant::now();
        // Run on its own task so a panicking tool cannot take the loop down.
        let joined = AbortOnDrop(tokio::spawn(async move { tool.execute(arguments).await })).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool execution failed");
                ToolResult::from(e)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool task aborted");
                if let Some(bus) = events {
                    bus.publish(DomainEvent::ToolExecuted {
                        tool_name: call.name.clone(),
                        success: false,
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                }
                let message = format!("⚠️ Tool '{name}' encountered a problem: {e}");
                return outcome(ToolResult::failure(message.clone()), message, false);
            }
        };

        let finished = self.is_special(name) && !result.is_error();
        if finished {
            info!(tool = name, "Special tool has completed the task");
            registry.cleanup_all().await;
        }

        if let Some(bus) = events {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                success: !result.is_error(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }

        let observation = if result.is_empty() {
            format!("Cmd `{name}` completed with no output")
        } else {
            format!("Observed output of cmd `{name}` executed:\n{result}")
        };

        outcome(result, observation, finished)
    }

    fn truncate(&self, text: String) -> String {
        match self.max_observe {
            Some(max) => match text.char_indices().nth(max) {
                Some((cut, _)) => text[..cut].to_string(),
                None => text,
            },
            None => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use taskloom_core::error::ToolError;
    use taskloom_core::tool::Tool;
    use taskloom_tools::TerminateTool;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError> {
            match args["text"].as_str() {
                Some("") => Ok(ToolResult::default()),
                Some(text) => Ok(ToolResult::success(text)),
                None => Err(ToolError::InvalidArguments("missing text".into())),
            }
        }
    }

    struct Panics;

    #[async_trait]
    impl Tool for Panics {
        fn name(&self) -> &str {
            "panics"
        }
        fn description(&self) -> &str {
            "always panics"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            panic!("boom");
        }
    }

    #[derive(Default)]
    struct CountsCleanup(AtomicUsize);

    #[async_trait]
    impl Tool for CountsCleanup {
        fn name(&self) -> &str {
            "resource"
        }
        fn description(&self) -> &str {
            "holds a resource"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::success("held"))
        }
        async fn cleanup(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Hangs {
        dropped: Arc<AtomicBool>,
        completed: AtomicBool,
    }

    #[async_trait]
    impl Tool for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }
        fn description(&self) -> &str {
            "never returns in time"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            let _flag = SetOnDrop(self.dropped.clone());
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.completed.store(true, Ordering::SeqCst);
            Ok(ToolResult::success("late"))
        }
    }

    /// Counts the events already on the bus when `cleanup` runs.
    struct WatchesBus {
        rx: std::sync::Mutex<tokio::sync::broadcast::Receiver<Arc<DomainEvent>>>,
        seen_at_cleanup: AtomicUsize,
    }

    #[async_trait]
    impl Tool for WatchesBus {
        fn name(&self) -> &str {
            "watcher"
        }
        fn description(&self) -> &str {
            "watches the bus"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::default())
        }
        async fn cleanup(&self) {
            let mut rx = self.rx.lock().unwrap();
            let mut seen = 0;
            while rx.try_recv().is_ok() {
                seen += 1;
            }
            self.seen_at_cleanup.store(seen, Ordering::SeqCst);
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with(Arc::new(Echo))
            .with(Arc::new(Panics))
            .with(Arc::new(TerminateTool::new()))
    }

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall::new(format!("call_{name}"), name, args)
    }

    #[tokio::test]
    async fn successful_call_is_observed() {
        let out = Dispatcher::new()
            .dispatch(&registry(), &call("echo", r#"{"text":"hi"}"#), None)
            .await;
        assert_eq!(out.observation, "Observed output of cmd `echo` executed:\nhi");
        assert!(!out.finished);
    }

    #[tokio::test]
    async fn empty_result_reports_no_output() {
        let out = Dispatcher::new()
            .dispatch(&registry(), &call("echo", r#"{"text":""}"#), None)
            .await;
        assert_eq!(out.observation, "Cmd `echo` completed with no output");
    }

    #[tokio::test]
    async fn unknown_tool_names_the_tool() {
        let out = Dispatcher::new()
            .dispatch(&registry(), &call("frobnicate", "{}"), None)
            .await;
        assert!(out.result.error.as_deref().unwrap().contains("frobnicate"));
        assert_eq!(out.observation, "Error: Unknown tool 'frobnicate'");
    }

    #[tokio::test]
    async fn malformed_arguments() {
        let out = Dispatcher::new()
            .dispatch(&registry(), &call("echo", "{not json"), None)
            .await;
        assert_eq!(
            out.observation,
            "Error parsing arguments for echo: Invalid JSON format"
        );
        assert!(out.result.is_error());
    }

    #[tokio::test]
    async fn tool_error_becomes_observation() {
        let out = Dispatcher::new()
            .dispatch(&registry(), &call("echo", "{}"), None)
            .await;
        assert_eq!(
            out.observation,
            "Observed output of cmd `echo` executed:\nError: Invalid tool arguments: missing text"
        );
    }

    #[tokio::test]
    async fn panicking_tool_does_not_escape() {
        let out = Dispatcher::new()
            .dispatch(&registry(), &call("panics", "{}"), None)
            .await;
        assert!(
            out.observation
                .starts_with("⚠️ Tool 'panics' encountered a problem:")
        );
        assert!(out.result.is_error());
    }

    #[tokio::test]
    async fn terminate_finishes_and_cleans_up() {
        let resource = Arc::new(CountsCleanup::default());
        let registry = registry().with(resource.clone());
        let out = Dispatcher::new()
            .dispatch(&registry, &call("terminate", r#"{"status":"success"}"#), None)
            .await;
        assert!(out.finished);
        assert_eq!(resource.0.load(Ordering::SeqCst), 1);
        assert!(
            out.observation
                .ends_with("The interaction has been completed with status: success")
        );
    }

    #[tokio::test]
    async fn failed_special_tool_does_not_finish() {
        let out = Dispatcher::new()
            .dispatch(&registry(), &call("terminate", r#"{"status":"maybe"}"#), None)
            .await;
        assert!(!out.finished);
    }

    #[tokio::test]
    async fn observation_is_truncated() {
        let out = Dispatcher::new()
            .with_max_observe(Some(12))
            .dispatch(&registry(), &call("echo", r#"{"text":"hello"}"#), None)
            .await;
        assert_eq!(out.observation, "Observed out");
    }

    #[tokio::test]
    async fn publishes_tool_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        Dispatcher::new()
            .dispatch(&registry(), &call("echo", r#"{"text":"x"}"#), Some(&bus))
            .await;
        match &*rx.recv().await.unwrap() {
            DomainEvent::ToolExecuted {
                tool_name, success, ..
            } => {
                assert_eq!(tool_name, "echo");
                assert!(success);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_dispatch_aborts_the_tool() {
        let hangs = Arc::new(Hangs::default());
        let registry = registry().with(hangs.clone());
        let dispatcher = Dispatcher::new();

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            dispatcher.dispatch(&registry, &call("hangs", "{}"), None),
        )
        .await;
        assert!(outcome.is_err());

        for _ in 0..100 {
            if hangs.dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(hangs.dropped.load(Ordering::SeqCst));
        assert!(!hangs.completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn special_tool_cleans_up_before_reporting() {
        let bus = EventBus::default();
        let watcher = Arc::new(WatchesBus {
            rx: std::sync::Mutex::new(bus.subscribe()),
            seen_at_cleanup: AtomicUsize::new(usize::MAX),
        });
        let mut rx = bus.subscribe();
        let registry = registry().with(watcher.clone());

        let out = Dispatcher::new()
            .dispatch(&registry, &call("terminate", r#"{"status":"success"}"#), Some(&bus))
            .await;

        assert!(out.finished);
        assert_eq!(watcher.seen_at_cleanup.load(Ordering::SeqCst), 0);
        assert!(matches!(
            &*rx.recv().await.unwrap(),
            DomainEvent::ToolExecuted { tool_name, .. } if tool_name == "terminate"
        ));
    }
}
