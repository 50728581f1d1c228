//! # toolrelay-tools
//!
//! Tool abstraction for Toolrelay.
//!
//! This crate provides:
//! - The [`Tool`] trait implemented by remote tool descriptors
//! - An insertion-ordered [`ToolRegistry`] used to merge tool sets
//! - [`ArgumentAdapter`], which turns free-form model text into structured
//!   arguments using a tool's input schema
//! - [`AdaptedTool`], the text-in/text-out calling convention the agent uses
//!
//! ## Example
//!
//! ```ignore
//! use toolrelay_tools::{AdaptedTool, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(tool)?;
//!
//! let adapted: Vec<AdaptedTool> = registry.tools().cloned().map(AdaptedTool::new).collect();
//! let answer = adapted[0].run(r#"{"symbol": "AAPL"}"#).await;
//! ```

use thiserror::Error;

pub mod adapter;
pub mod arguments;
pub mod registry;

pub use adapter::{AdaptedTool, ERROR_MARKER};
pub use arguments::{ArgumentAdapter, ParamType};
pub use registry::{Tool, ToolRegistry};

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// A tool with the same name is already registered.
    #[error("duplicate tool name: {0}")]
    Duplicate(String),

    /// Invalid arguments provided to the tool.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Required parameter is missing.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// Parameter has wrong type.
    #[error("parameter '{0}' has wrong type: expected {1}")]
    WrongType(String, String),

    /// Generic execution error.
    #[error("execution error: {0}")]
    Execution(String),
}

impl ToolError {
    /// Create an invalid arguments error.
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a missing parameter error.
    pub fn missing_param(name: impl Into<String>) -> Self {
        Self::MissingParameter(name.into())
    }

    /// Create a wrong type error.
    pub fn wrong_type(param: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::WrongType(param.into(), expected.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}
