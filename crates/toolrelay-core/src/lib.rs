//! # toolrelay-core
//!
//! Core types and abstractions for Toolrelay, a bridge between a tool-calling
//! language-model agent and remote MCP tool servers.
//!
//! This crate provides:
//! - Message and transcript primitives
//! - Tool definitions and tool call types
//! - Configuration system
//! - Common error types

pub mod config;
pub mod error;
pub mod message;
pub mod tool;

pub use config::{Config, McpServerConfig, ProviderConfig};
pub use error::{Error, Result};
pub use message::{Content, Message, Role};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
