//! CLI command implementations.

pub mod config;
pub mod query;
pub mod tools;

use std::sync::Arc;

use toolrelay_agent::{AgentConfig, AgentEventHandler, AgentRunner, ToolCallingAgentFactory};
use toolrelay_core::Error;
use toolrelay_providers::OpenAIProvider;
use tracing::debug;

use crate::AppContext;

/// Build a runner backed by the configured OpenAI provider.
pub fn build_runner(ctx: &AppContext, handler: Arc<dyn AgentEventHandler>) -> anyhow::Result<AgentRunner> {
    let provider_config = ctx.config.providers.openai.clone().unwrap_or_default();
    let provider = OpenAIProvider::from_config(&provider_config).map_err(Error::Provider)?;

    debug!(model = %ctx.config.general.model, "Using OpenAI provider");

    let factory = ToolCallingAgentFactory::new(Arc::new(provider), AgentConfig::from_config(&ctx.config))
        .with_event_handler(handler);
    Ok(AgentRunner::new(Arc::new(factory)))
}
