//! Shared test helpers for agent tests.

use std::sync::Mutex;

use taskloom_core::error::ProviderError;
use taskloom_core::message::ToolCall;
use taskloom_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// A mock oracle that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request it was given. Panics if more calls are made than
/// responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();

        if count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{count}, have {})",
                responses.len()
            );
        }

        requests.push(request);
        Ok(responses[count].clone())
    }
}

/// An oracle that always fails.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A plain text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        usage: usage(),
        model: "mock-model".into(),
        ..ProviderResponse::text(text)
    }
}

/// A response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> ProviderResponse {
    let content = (!thought.is_empty()).then(|| thought.to_string());
    ProviderResponse {
        usage: usage(),
        model: "mock-model".into(),
        ..ProviderResponse::with_tool_calls(content, tool_calls)
    }
}

/// A tool call with id `call_{name}`.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCall {
    make_tool_call_with_id(&format!("call_{name}"), name, args)
}

pub fn make_tool_call_with_id(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, serde_json::to_string(&args).unwrap())
}

/// `terminate` with the given status.
pub fn terminate_call(status: &str) -> ToolCall {
    make_tool_call("terminate", serde_json::json!({ "status": status }))
}
