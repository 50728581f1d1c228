//! Text-in/text-out wrapper around a [`Tool`].

use std::sync::Arc;

use serde_json::Value;
use toolrelay_core::ToolDefinition;
use tracing::{debug, warn};

use crate::arguments::ArgumentAdapter;
use crate::registry::Tool;
use crate::ToolError;

/// Prefix of the text returned in place of a failed tool call.
pub const ERROR_MARKER: &str = "Error: ";

/// A tool in the calling convention the agent expects: a single text input,
/// a single text output, and failures reported as text.
#[derive(Clone)]
pub struct AdaptedTool {
    inner: Arc<dyn Tool>,
    definition: ToolDefinition,
    arguments: ArgumentAdapter,
}

impl std::fmt::Debug for AdaptedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptedTool")
            .field("name", &self.definition.name)
            .finish()
    }
}

impl AdaptedTool {
    /// Wrap a tool, deriving the argument adapter from its schema.
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        let definition = tool.definition();
        let arguments = ArgumentAdapter::from_schema(&definition.parameters);
        Self {
            inner: tool,
            definition,
            arguments,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    /// Definition advertised to the model.
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Coerce the input, call the tool and render its result as text.
    pub async fn try_run(&self, input: &str) -> Result<String, ToolError> {
        let arguments = self.arguments.coerce(input)?;
        debug!(tool = %self.name(), %arguments, "Calling tool");
        let result = self.inner.call(arguments).await?;
        Ok(render(result))
    }

    /// Like [`try_run`](Self::try_run) but never fails: errors come back as
    /// `Error: <message>`.
    pub async fn run(&self, input: &str) -> String {
        match self.try_run(input).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %self.name(), error = %e, "Tool call failed");
                format!("{}{}", ERROR_MARKER, e)
            }
        }
    }
}

fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
