//! # toolrelay-mcp
//!
//! MCP (Model Context Protocol) client for Toolrelay.
//!
//! This crate provides:
//! - The streamable HTTP transport with SSE response support
//! - `McpConnection` for one server session (handshake, tool listing, calls)
//! - `McpClient` for connecting to several servers concurrently
//! - `McpTool`, which exposes a remote tool through the `Tool` trait

pub mod client;
pub mod error;
pub mod protocol;
pub mod sse;
pub mod tools;
pub mod transport;

pub use client::{ConnectionState, McpClient, McpConnection};
pub use error::{McpError, TransportError};
pub use tools::McpTool;
pub use transport::{HttpTransport, Transport};
