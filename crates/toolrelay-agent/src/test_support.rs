//! Shared fakes for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use toolrelay_core::{ToolCall, ToolDefinition};
use toolrelay_providers::{CompletionRequest, CompletionResponse, FinishReason, Provider, Usage};
use toolrelay_tools::{Tool, ToolError};

// ============================================================================
// Echo Tool
// ============================================================================

/// Takes a required `symbol` and answers `<name>(<symbol>)`.
pub(crate) struct EchoTool {
    name: String,
}

impl EchoTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, format!("Echo tool {}", self.name)).with_parameters(json!({
            "type": "object",
            "properties": { "symbol": { "type": "string" } },
            "required": ["symbol"]
        }))
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let symbol = arguments["symbol"].as_str().unwrap_or_default();
        if symbol == "FAIL" {
            return Err(ToolError::execution("unknown symbol FAIL"));
        }
        Ok(Value::String(format!("{}({})", self.name, symbol)))
    }
}

// ============================================================================
// Mock Provider
// ============================================================================

/// Replays canned responses and records every request.
pub(crate) struct MockProvider {
    responses: Mutex<Vec<CompletionResponse>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(vec![]),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_response(content: &str) -> Self {
        Self::new(vec![text_response(content)])
    }

    pub fn with_tool_call(tool_name: &str, args: &str, final_response: &str) -> Self {
        Self::new(vec![
            tool_response(vec![ToolCall::new("call_1", tool_name, args)]),
            text_response(final_response),
        ])
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

pub(crate) fn text_response(content: &str) -> CompletionResponse {
    CompletionResponse {
        content: content.to_string(),
        tool_calls: vec![],
        finish_reason: FinishReason::Stop,
        usage: Usage::default(),
    }
}

pub(crate) fn tool_response(calls: Vec<ToolCall>) -> CompletionResponse {
    CompletionResponse {
        content: String::new(),
        tool_calls: calls,
        finish_reason: FinishReason::ToolUse,
        usage: Usage::default(),
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            anyhow::bail!("no more responses");
        }
        Ok(responses.remove(0))
    }
}
