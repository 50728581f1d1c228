//! Bridges MCP tool servers to an agent.
//!
//! [`AgentRunner`] owns the connections to every configured server, the
//! merged tool set and the agent built over it. Its lifecycle is
//! `setup_with_servers` → any number of `run` calls → `cleanup`.

use std::sync::Arc;

use thiserror::Error;
use toolrelay_core::McpServerConfig;
use toolrelay_mcp::{McpClient, McpError, McpTool};
use toolrelay_tools::{AdaptedTool, ToolRegistry};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentError, AgentFactory, AgentInput};

/// Answer used when the agent produced no text.
pub const NO_RESPONSE: &str = "No response generated";

/// Errors from the runner.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// A server could not be reached or listed.
    #[error("connection error: {0}")]
    Connection(#[from] McpError),

    /// The runner is not ready for this operation.
    #[error("invalid state: {0}")]
    State(String),

    /// The servers produced an unusable tool set.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The agent failed while answering.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Connects tool servers, builds the agent and answers queries.
pub struct AgentRunner {
    factory: Arc<dyn AgentFactory>,
    client: McpClient,
    remote_tools: Vec<McpTool>,
    tools: Vec<AdaptedTool>,
    agent: Option<Arc<dyn Agent>>,
}

impl AgentRunner {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            client: McpClient::new(),
            remote_tools: Vec::new(),
            tools: Vec::new(),
            agent: None,
        }
    }

    /// Connect to `servers`, merge their tools and build the agent.
    ///
    /// Anything from a previous setup is released first. On failure no
    /// connection is left open.
    pub async fn setup_with_servers(&mut self, servers: &[McpServerConfig]) -> Result<(), RunnerError> {
        self.cleanup().await;

        let enabled = servers.iter().filter(|s| s.enabled).count();
        info!(servers = enabled, "Connecting to tool servers");

        let remote = self.client.connect_all(servers).await?;

        let mut registry = ToolRegistry::new();
        for tool in &remote {
            if let Err(e) = registry.register(Arc::new(tool.clone())) {
                self.client.disconnect_all().await;
                return Err(RunnerError::Configuration(format!(
                    "{} (from server '{}')",
                    e,
                    tool.server_name()
                )));
            }
        }

        if registry.is_empty() {
            self.client.disconnect_all().await;
            return Err(RunnerError::Configuration(
                "no tools available from the configured servers".into(),
            ));
        }

        let tools: Vec<AdaptedTool> = registry
            .tools()
            .map(|tool| AdaptedTool::new(tool.clone()))
            .collect();

        let agent = match self.factory.build(tools.clone()) {
            Ok(agent) => agent,
            Err(e) => {
                self.client.disconnect_all().await;
                return Err(RunnerError::Configuration(format!("failed to build agent: {}", e)));
            }
        };

        info!(
            tools = tools.len(),
            names = ?registry.list(),
            "Agent ready"
        );

        self.remote_tools = remote;
        self.tools = tools;
        self.agent = Some(agent);
        Ok(())
    }

    /// Answer one query.
    pub async fn run(&self, query: &str) -> Result<String, RunnerError> {
        let agent = match &self.agent {
            Some(agent) if !self.tools.is_empty() => agent,
            _ => {
                return Err(RunnerError::State(
                    "agent is not set up; call setup_with_servers first".into(),
                ))
            }
        };

        debug!(query, "Running query");
        let output = agent.invoke(AgentInput::user(query)).await?;

        let answer = output
            .last_message()
            .map(|m| m.text())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| {
                warn!(turns = output.turns, "Agent returned no text");
                NO_RESPONSE.to_string()
            });
        Ok(answer)
    }

    /// Disconnect every server and drop the agent. Safe to call repeatedly.
    pub async fn cleanup(&mut self) {
        self.agent = None;
        self.tools.clear();
        self.remote_tools.clear();
        if !self.client.is_empty().await {
            info!("Disconnecting tool servers");
        }
        self.client.disconnect_all().await;
    }

    pub fn is_ready(&self) -> bool {
        self.agent.is_some()
    }

    /// Adapted tools in merge order.
    pub fn tools(&self) -> &[AdaptedTool] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// The remote tools behind the adapted set, with their server names.
    pub fn remote_tools(&self) -> &[McpTool] {
        &self.remote_tools
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentConfig, ToolCallingAgentFactory};
    use crate::test_support::MockProvider;

    fn runner() -> AgentRunner {
        let provider = Arc::new(MockProvider::with_response("unused"));
        AgentRunner::new(Arc::new(ToolCallingAgentFactory::new(
            provider,
            AgentConfig::default(),
        )))
    }

    #[tokio::test]
    async fn test_run_before_setup_is_state_error() {
        let runner = runner();
        let err = runner.run("What is AAPL?").await.unwrap_err();
        assert!(matches!(err, RunnerError::State(_)));
        assert!(!runner.is_ready());
    }

    #[tokio::test]
    async fn test_setup_without_servers_is_configuration_error() {
        let mut runner = runner();
        let err = runner.setup_with_servers(&[]).await.unwrap_err();

        assert!(matches!(err, RunnerError::Configuration(_)));
        assert!(!runner.is_ready());
        assert!(runner.tool_names().is_empty());
    }

    #[tokio::test]
    async fn test_all_servers_disabled_is_configuration_error() {
        let mut runner = runner();
        let servers = [McpServerConfig::new("stocks", "http://127.0.0.1:9/sse").with_enabled(false)];
        let err = runner.setup_with_servers(&servers).await.unwrap_err();
        assert!(matches!(err, RunnerError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let mut runner = runner();
        runner.cleanup().await;
        runner.cleanup().await;
        assert!(!runner.is_ready());
        assert!(runner.client().is_empty().await);
    }
}
