//! # toolrelay-providers
//!
//! Language-model provider abstraction for Toolrelay.
//!
//! This crate provides:
//! - The [`Provider`] trait the agent drives
//! - An OpenAI chat-completions implementation with tool calling

pub mod openai;
pub mod traits;

pub use openai::OpenAIProvider;
pub use traits::{CompletionRequest, CompletionResponse, FinishReason, Provider, Usage};
