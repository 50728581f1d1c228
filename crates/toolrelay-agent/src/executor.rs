//! Tool execution for the agent loop.
//!
//! [`ToolExecutor`] dispatches model tool calls to [`AdaptedTool`]s by name.
//! Calls never fail: unknown tools and tool errors come back as `Error:`
//! results that the model can read and react to.

use std::collections::HashMap;
use std::time::Instant;

use toolrelay_core::{ToolCall, ToolDefinition, ToolResult};
use toolrelay_tools::{AdaptedTool, ToolError, ERROR_MARKER};
use tracing::{debug, warn};

/// Dispatches tool calls to a fixed set of adapted tools.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    tools: Vec<AdaptedTool>,
    index: HashMap<String, usize>,
}

impl ToolExecutor {
    /// Create an executor over `tools`. Later duplicates of a name are ignored.
    pub fn new(tools: Vec<AdaptedTool>) -> Self {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            index.entry(tool.name().to_string()).or_insert(i);
        }
        Self { tools, index }
    }

    /// Definitions advertised to the model, in tool order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition().clone()).collect()
    }

    /// Tool names in order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one tool call.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();

        let Some(tool) = self.index.get(&call.name).map(|&i| &self.tools[i]) else {
            warn!(tool = %call.name, "Model requested unknown tool");
            return ToolResult::error(
                &call.id,
                format!("{}{}", ERROR_MARKER, ToolError::NotFound(call.name.clone())),
            );
        };

        debug!(tool = %call.name, call_id = %call.id, "Executing tool call");

        let output = tool.run(&call.arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = if output.starts_with(ERROR_MARKER) {
            ToolResult::error(&call.id, output)
        } else {
            ToolResult::success(&call.id, output)
        };
        result.with_duration(duration_ms)
    }

    /// Execute calls one after another, in order.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EchoTool;
    use std::sync::Arc;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(vec![
            AdaptedTool::new(Arc::new(EchoTool::new("get_stock_price"))),
            AdaptedTool::new(Arc::new(EchoTool::new("fetch_news"))),
        ])
    }

    #[tokio::test]
    async fn test_execute_success() {
        let result = executor()
            .execute(&ToolCall::new("c1", "get_stock_price", "MSFT"))
            .await;

        assert!(result.success);
        assert_eq!(result.tool_call_id, "c1");
        assert_eq!(result.output, "get_stock_price(MSFT)");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let result = executor().execute(&ToolCall::new("c2", "delete_all", "{}")).await;

        assert!(!result.success);
        assert_eq!(result.output, "Error: tool not found: delete_all");
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_result() {
        let result = executor().execute(&ToolCall::new("c3", "fetch_news", "")).await;

        assert!(!result.success);
        assert!(result.output.starts_with(ERROR_MARKER));
    }

    #[tokio::test]
    async fn test_execute_all_keeps_order() {
        let calls = vec![
            ToolCall::new("a", "fetch_news", "AI"),
            ToolCall::new("b", "get_stock_price", "NVDA"),
        ];
        let results = executor().execute_all(&calls).await;

        let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(executor().names(), vec!["get_stock_price", "fetch_news"]);
    }
}
