//! Remote MCP tools exposed through the `Tool` trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use toolrelay_core::ToolDefinition;
use toolrelay_tools::{Tool, ToolError};

use crate::client::McpConnection;
use crate::error::McpError;
use crate::protocol::{CallToolResult, McpToolDefinition};

/// A tool advertised by an MCP server.
///
/// Each tool holds the connection it came from, so calls always go back to
/// the same server session.
#[derive(Clone)]
pub struct McpTool {
    definition: McpToolDefinition,
    connection: Arc<McpConnection>,
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool")
            .field("server", &self.connection.name())
            .field("name", &self.definition.name)
            .finish()
    }
}

impl McpTool {
    /// Bind a tool definition to its connection.
    pub fn new(connection: Arc<McpConnection>, definition: McpToolDefinition) -> Self {
        Self {
            definition,
            connection,
        }
    }

    /// Name of the server this tool lives on.
    pub fn server_name(&self) -> &str {
        self.connection.name()
    }

    /// Tool name as advertised by the server.
    pub fn tool_name(&self) -> &str {
        &self.definition.name
    }

    /// The raw MCP definition.
    pub fn mcp_definition(&self) -> &McpToolDefinition {
        &self.definition
    }

    /// Invoke the tool and decode its result.
    pub async fn invoke(&self, arguments: Value) -> Result<Value, McpError> {
        let result = self
            .connection
            .call_tool(&self.definition.name, Some(arguments))
            .await?;

        if result.is_error {
            let text = result.text();
            return Err(McpError::ToolFailed {
                tool: self.definition.name.clone(),
                message: if text.is_empty() {
                    "tool reported an error".to_string()
                } else {
                    text
                },
            });
        }

        decode_result(result)
    }
}

/// First text content when textual, otherwise the whole result as JSON.
fn decode_result(result: CallToolResult) -> Result<Value, McpError> {
    if let Some(text) = result.first_text() {
        return Ok(Value::String(text.to_string()));
    }
    Ok(serde_json::to_value(result)?)
}

impl From<McpError> for ToolError {
    fn from(e: McpError) -> Self {
        match e {
            McpError::ToolFailed { message, .. } => ToolError::Execution(message),
            other => ToolError::Execution(other.to_string()),
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.to_definition()
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        Ok(self.invoke(arguments).await?)
    }
}
