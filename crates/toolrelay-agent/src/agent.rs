//! Tool-calling agent.
//!
//! The bridge only talks to agents through the [`Agent`] trait and builds
//! them through an [`AgentFactory`]. [`ToolCallingAgent`] is the default
//! implementation: a loop that asks the model for a completion, runs any
//! requested tools and feeds the results back until the model answers.
//!
//! ## Architecture
//!
//! ```text
//! ToolCallingAgent
//! ├── Provider (LLM interaction)
//! ├── ToolExecutor (adapted MCP tools)
//! └── AgentEventHandler (progress callbacks)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use toolrelay_core::{Config, Message, ToolCall, ToolResult};
use toolrelay_providers::{CompletionRequest, Provider};
use toolrelay_tools::AdaptedTool;
use tracing::{debug, info, warn};

use crate::executor::ToolExecutor;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during agent operations.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Error from the AI provider.
    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),

    /// Maximum turns exceeded.
    #[error("Maximum turns exceeded: {0}")]
    MaxTurnsExceeded(usize),

    /// Agent not properly configured.
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier to use.
    pub model: String,
    /// System prompt.
    pub system_prompt: Option<String>,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
    /// Maximum number of model turns per invocation.
    pub max_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AgentConfig {
    /// Take the model and limits from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.general.model.clone(),
            system_prompt: config.general.system_prompt.clone(),
            max_tokens: config.limits.max_tokens,
            temperature: config.limits.temperature,
            max_turns: config.limits.max_turns,
        }
    }
}

// ============================================================================
// Input / Output
// ============================================================================

/// Messages handed to an agent.
#[derive(Debug, Clone, Default)]
pub struct AgentInput {
    pub messages: Vec<Message>,
}

impl AgentInput {
    /// A single user turn.
    pub fn user(query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(query)],
        }
    }
}

/// The transcript an agent returns: the input followed by everything it added.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub messages: Vec<Message>,
    /// Model turns taken.
    pub turns: usize,
}

impl AgentOutput {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

// ============================================================================
// Agent Seams
// ============================================================================

/// Anything that can answer a conversation.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn invoke(&self, input: AgentInput) -> AgentResult<AgentOutput>;
}

/// Builds an agent bound to a tool set.
pub trait AgentFactory: Send + Sync {
    fn build(&self, tools: Vec<AdaptedTool>) -> AgentResult<Arc<dyn Agent>>;
}

// ============================================================================
// Event Handler
// ============================================================================

/// Handler for agent events during execution.
///
/// Implement this trait to receive callbacks during agent operation.
pub trait AgentEventHandler: Send + Sync {
    /// Called before each model request.
    fn on_thinking(&self) {}

    /// Called when a tool execution starts.
    fn on_tool_start(&self, _call: &ToolCall) {}

    /// Called when a tool execution completes.
    fn on_tool_complete(&self, _call: &ToolCall, _result: &ToolResult) {}

    /// Called when the agent completes successfully.
    fn on_complete(&self, _output: &AgentOutput) {}

    /// Called when an error occurs.
    fn on_error(&self, _error: &AgentError) {}
}

/// Default event handler that does nothing.
pub struct NoOpEventHandler;

impl AgentEventHandler for NoOpEventHandler {}

// ============================================================================
// Tool Calling Agent
// ============================================================================

/// A model-driven loop over a fixed tool set.
///
/// Holds no conversation state; every [`invoke`](Agent::invoke) starts from
/// the messages it is given.
pub struct ToolCallingAgent {
    provider: Arc<dyn Provider>,
    executor: ToolExecutor,
    config: AgentConfig,
    event_handler: Arc<dyn AgentEventHandler>,
}

impl ToolCallingAgent {
    /// Create a new agent. Prefer [`AgentBuilder`].
    pub fn new(
        provider: Arc<dyn Provider>,
        executor: ToolExecutor,
        config: AgentConfig,
        event_handler: Arc<dyn AgentEventHandler>,
    ) -> Self {
        Self {
            provider,
            executor,
            config,
            event_handler,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    async fn run_loop(&self, mut messages: Vec<Message>) -> AgentResult<AgentOutput> {
        let tools = self.executor.definitions();

        for turn in 0..self.config.max_turns {
            debug!(turn, "Running agent turn");
            self.event_handler.on_thinking();

            let request = CompletionRequest {
                model: self.config.model.clone(),
                messages: messages.clone(),
                system: self.config.system_prompt.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                tools: tools.clone(),
            };
            let response = self.provider.complete(request).await?;

            let calls = response.tool_calls;
            messages.push(Message::assistant(response.content).with_tool_calls(calls.clone()));

            if calls.is_empty() {
                return Ok(AgentOutput {
                    messages,
                    turns: turn + 1,
                });
            }

            for call in &calls {
                self.event_handler.on_tool_start(call);
                let result = self.executor.execute(call).await;
                self.event_handler.on_tool_complete(call, &result);
                messages.push(Message::tool_result(
                    result.tool_call_id,
                    result.output,
                    !result.success,
                ));
            }
        }

        warn!(max_turns = self.config.max_turns, "Max turns exceeded");
        Err(AgentError::MaxTurnsExceeded(self.config.max_turns))
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn invoke(&self, input: AgentInput) -> AgentResult<AgentOutput> {
        match self.run_loop(input.messages).await {
            Ok(output) => {
                self.event_handler.on_complete(&output);
                Ok(output)
            }
            Err(e) => {
                self.event_handler.on_error(&e);
                Err(e)
            }
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for creating a [`ToolCallingAgent`].
pub struct AgentBuilder {
    provider: Option<Arc<dyn Provider>>,
    tools: Vec<AdaptedTool>,
    config: AgentConfig,
    event_handler: Option<Arc<dyn AgentEventHandler>>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Vec::new(),
            config: AgentConfig::default(),
            event_handler: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Vec<AdaptedTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_turns(mut self, max: usize) -> Self {
        self.config.max_turns = max;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn AgentEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the agent.
    ///
    /// Fails without a provider or with an empty tool set.
    pub fn build(self) -> AgentResult<ToolCallingAgent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::NotConfigured("provider is required".into()))?;
        if self.tools.is_empty() {
            return Err(AgentError::NotConfigured("at least one tool is required".into()));
        }
        let event_handler = self
            .event_handler
            .unwrap_or_else(|| Arc::new(NoOpEventHandler));

        info!(
            provider = provider.id(),
            model = %self.config.model,
            tools = self.tools.len(),
            "Building tool-calling agent"
        );

        Ok(ToolCallingAgent::new(
            provider,
            ToolExecutor::new(self.tools),
            self.config,
            event_handler,
        ))
    }
}

/// Factory producing [`ToolCallingAgent`]s over one provider.
#[derive(Clone)]
pub struct ToolCallingAgentFactory {
    provider: Arc<dyn Provider>,
    config: AgentConfig,
    event_handler: Arc<dyn AgentEventHandler>,
}

impl ToolCallingAgentFactory {
    pub fn new(provider: Arc<dyn Provider>, config: AgentConfig) -> Self {
        Self {
            provider,
            config,
            event_handler: Arc::new(NoOpEventHandler),
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn AgentEventHandler>) -> Self {
        self.event_handler = handler;
        self
    }
}

impl AgentFactory for ToolCallingAgentFactory {
    fn build(&self, tools: Vec<AdaptedTool>) -> AgentResult<Arc<dyn Agent>> {
        let agent = AgentBuilder::new()
            .provider(self.provider.clone())
            .tools(tools)
            .config(self.config.clone())
            .event_handler(self.event_handler.clone())
            .build()?;
        Ok(Arc::new(agent))
    }
}

// ============================================================================
// Tests
// ============================================================================
