//! # toolrelay-agent
//!
//! Agent orchestration for Toolrelay.
//!
//! This crate provides:
//! - The `Agent` and `AgentFactory` seams
//! - A tool-calling agent loop over a model provider
//! - Tool execution over adapted MCP tools
//! - `AgentRunner`, which connects servers, builds the agent and answers queries

pub mod agent;
pub mod executor;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use agent::{
    Agent, AgentBuilder, AgentConfig, AgentError, AgentEventHandler, AgentFactory, AgentInput,
    AgentOutput, AgentResult, NoOpEventHandler, ToolCallingAgent, ToolCallingAgentFactory,
};
pub use executor::ToolExecutor;
pub use runner::{AgentRunner, RunnerError, NO_RESPONSE};
