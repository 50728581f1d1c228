//! End-to-end tests for the runner against mock MCP servers and a scripted model.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use toolrelay_agent::{
    Agent, AgentConfig, AgentError, AgentFactory, AgentInput, AgentOutput, AgentResult, AgentRunner,
    RunnerError, ToolCallingAgentFactory, NO_RESPONSE,
};
use toolrelay_core::{McpServerConfig, Message, Role, ToolCall};
use toolrelay_providers::{CompletionRequest, CompletionResponse, FinishReason, Provider, Usage};
use toolrelay_tools::AdaptedTool;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ============================================================================
// Mock MCP Server
// ============================================================================

async fn mcp_server(name: &'static str, tools: &'static [&'static str], delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(move |request: &Request| {
            let body: Value = request.body_json().unwrap_or_else(|_| json!({}));
            let id = body.get("id").cloned().unwrap_or(Value::Null);
            let result = match body["method"].as_str().unwrap_or_default() {
                "initialize" => json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": name, "version": "1.0.0" }
                }),
                "notifications/initialized" => return ResponseTemplate::new(202),
                "tools/list" => json!({
                    "tools": tools.iter().map(|tool| json!({
                        "name": tool,
                        "description": format!("{} on {}", tool, name),
                        "inputSchema": {
                            "type": "object",
                            "properties": { "symbol": { "type": "string" } },
                            "required": ["symbol"]
                        }
                    })).collect::<Vec<_>>()
                }),
                "tools/call" => {
                    let symbol = body["params"]["arguments"]["symbol"].as_str().unwrap_or_default();
                    let tool = body["params"]["name"].as_str().unwrap_or_default();
                    if symbol == "FAIL" {
                        json!({ "content": [{ "type": "text", "text": "unknown symbol" }], "isError": true })
                    } else {
                        json!({ "content": [{ "type": "text", "text": format!("{} {}", tool, symbol) }] })
                    }
                }
                _ => json!({}),
            };
            ResponseTemplate::new(200)
                .insert_header("mcp-session-id", name)
                .set_body_json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
                .set_delay(delay)
        })
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

async fn deletes(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .count()
}

// ============================================================================
// Scripted Provider
// ============================================================================

/// Calls the scripted tools on the first turn, then answers with the tool
/// outputs joined by `|`.
struct ScriptedProvider {
    calls: Vec<(String, String)>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(calls: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            calls: calls.iter().map(|(n, a)| (n.to_string(), a.to_string())).collect(),
            requests: Mutex::new(vec![]),
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let first_turn = request.messages.last().map(|m| m.role) == Some(Role::User);
        let tool_outputs: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.text())
            .collect();
        self.requests.lock().unwrap().push(request);

        if first_turn && !self.calls.is_empty() {
            let tool_calls = self
                .calls
                .iter()
                .enumerate()
                .map(|(i, (name, args))| ToolCall::new(format!("call_{}", i), name, args))
                .collect();
            return Ok(CompletionResponse {
                content: String::new(),
                tool_calls,
                finish_reason: FinishReason::ToolUse,
                usage: Usage::default(),
            });
        }

        Ok(CompletionResponse {
            content: tool_outputs.join("|"),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        })
    }
}

fn runner_with(provider: Arc<ScriptedProvider>) -> AgentRunner {
    AgentRunner::new(Arc::new(ToolCallingAgentFactory::new(provider, AgentConfig::default())))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_setup_merges_tools_in_server_order() {
    // The first server is the slowest to answer
    let stocks = mcp_server("stocks", &["fetch_stock_info", "get_stock_price"], Duration::from_millis(100)).await;
    let news = mcp_server("news", &["fetch_news"], Duration::ZERO).await;

    let mut runner = runner_with(ScriptedProvider::new(&[]));
    runner
        .setup_with_servers(&[
            McpServerConfig::new("stocks", stocks.uri()),
            McpServerConfig::new("news", news.uri()),
        ])
        .await
        .unwrap();

    assert!(runner.is_ready());
    assert_eq!(runner.tool_names(), vec!["fetch_stock_info", "get_stock_price", "fetch_news"]);
    let servers: Vec<_> = runner.remote_tools().iter().map(|t| t.server_name()).collect();
    assert_eq!(servers, vec!["stocks", "stocks", "news"]);

    runner.cleanup().await;
    assert_eq!(deletes(&stocks).await, 1);
    assert_eq!(deletes(&news).await, 1);
}

#[tokio::test]
async fn test_run_answers_with_tool_output() {
    let stocks = mcp_server("stocks", &["fetch_stock_info"], Duration::ZERO).await;
    let news = mcp_server("news", &["fetch_news"], Duration::ZERO).await;
    let provider = ScriptedProvider::new(&[("fetch_stock_info", "AAPL"), ("fetch_news", r#"{"symbol":"AAPL"}"#)]);

    let mut runner = runner_with(provider.clone());
    runner
        .setup_with_servers(&[
            McpServerConfig::new("stocks", stocks.uri()),
            McpServerConfig::new("news", news.uri()),
        ])
        .await
        .unwrap();

    let answer = runner.run("How is Apple doing?").await.unwrap();
    assert_eq!(answer, "fetch_stock_info AAPL|fetch_news AAPL");

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 2);
    assert_eq!(requests[0].tools[0].parameters["required"], json!(["symbol"]));
    drop(requests);

    runner.cleanup().await;
}

#[tokio::test]
async fn test_failing_tool_still_answers() {
    let stocks = mcp_server("stocks", &["fetch_stock_info"], Duration::ZERO).await;
    let provider = ScriptedProvider::new(&[("fetch_stock_info", "FAIL")]);

    let mut runner = runner_with(provider);
    runner
        .setup_with_servers(&[McpServerConfig::new("stocks", stocks.uri())])
        .await
        .unwrap();

    let answer = runner.run("What about FAIL?").await.unwrap();
    assert_eq!(answer, "Error: execution error: unknown symbol");

    runner.cleanup().await;
}

#[tokio::test]
async fn test_unreachable_server_fails_setup() {
    let stocks = mcp_server("stocks", &["fetch_stock_info"], Duration::ZERO).await;

    let mut runner = runner_with(ScriptedProvider::new(&[]));
    let err = runner
        .setup_with_servers(&[
            McpServerConfig::new("stocks", stocks.uri()),
            McpServerConfig::new("news", "http://127.0.0.1:9/sse"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::Connection(_)));
    assert!(!runner.is_ready());
    assert!(matches!(runner.run("hi").await, Err(RunnerError::State(_))));

    // Cleanup after a failed setup is a no-op
    runner.cleanup().await;
    runner.cleanup().await;
    assert!(runner.client().is_empty().await);
}

#[tokio::test]
async fn test_server_without_tools_is_configuration_error() {
    let empty = mcp_server("empty", &[], Duration::ZERO).await;

    let mut runner = runner_with(ScriptedProvider::new(&[]));
    let err = runner
        .setup_with_servers(&[McpServerConfig::new("empty", empty.uri())])
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::Configuration(_)));
    assert_eq!(deletes(&empty).await, 1);
}

#[tokio::test]
async fn test_duplicate_tool_names_are_rejected() {
    let first = mcp_server("stocks", &["fetch_news"], Duration::ZERO).await;
    let second = mcp_server("news", &["fetch_news"], Duration::ZERO).await;

    let mut runner = runner_with(ScriptedProvider::new(&[]));
    let err = runner
        .setup_with_servers(&[
            McpServerConfig::new("stocks", first.uri()),
            McpServerConfig::new("news", second.uri()),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::Configuration(ref m) if m.contains("fetch_news")));
    assert!(runner.client().is_empty().await);
    assert_eq!(deletes(&first).await, 1);
    assert_eq!(deletes(&second).await, 1);
}

#[tokio::test]
async fn test_setup_twice_replaces_previous_session() {
    let stocks = mcp_server("stocks", &["fetch_stock_info"], Duration::ZERO).await;
    let news = mcp_server("news", &["fetch_news"], Duration::ZERO).await;

    let mut runner = runner_with(ScriptedProvider::new(&[]));
    runner
        .setup_with_servers(&[McpServerConfig::new("stocks", stocks.uri())])
        .await
        .unwrap();
    runner
        .setup_with_servers(&[McpServerConfig::new("news", news.uri())])
        .await
        .unwrap();

    assert_eq!(runner.tool_names(), vec!["fetch_news"]);
    assert_eq!(deletes(&stocks).await, 1);
    assert_eq!(runner.client().list_servers().await, vec!["news"]);

    runner.cleanup().await;
}

// ============================================================================
// Custom Agent
// ============================================================================

/// An agent that answers with fixed text, whatever it is asked.
struct CannedAgent(&'static str);

#[async_trait]
impl Agent for CannedAgent {
    async fn invoke(&self, mut input: AgentInput) -> AgentResult<AgentOutput> {
        input.messages.push(Message::assistant(self.0));
        Ok(AgentOutput {
            messages: input.messages,
            turns: 1,
        })
    }
}

struct CannedFactory(&'static str);

impl AgentFactory for CannedFactory {
    fn build(&self, tools: Vec<AdaptedTool>) -> AgentResult<Arc<dyn Agent>> {
        if tools.is_empty() {
            return Err(AgentError::NotConfigured("no tools".into()));
        }
        Ok(Arc::new(CannedAgent(self.0)))
    }
}

async fn canned_answer(text: &'static str) -> String {
    let stocks = mcp_server("stocks", &["fetch_stock_info"], Duration::ZERO).await;

    let mut runner = AgentRunner::new(Arc::new(CannedFactory(text)));
    runner
        .setup_with_servers(&[McpServerConfig::new("stocks", stocks.uri())])
        .await
        .unwrap();

    let answer = runner.run("anything").await.unwrap();
    runner.cleanup().await;
    answer
}

#[tokio::test]
async fn test_empty_answer_uses_placeholder() {
    assert_eq!(canned_answer("").await, NO_RESPONSE);
    assert_eq!(NO_RESPONSE, "No response generated");
}

#[tokio::test]
async fn test_whitespace_answer_is_returned_as_is() {
    assert_eq!(canned_answer("  \n").await, "  \n");
}
