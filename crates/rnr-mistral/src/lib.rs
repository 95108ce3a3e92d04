//! Mistral AI integration for RAG 'n' Roll
//!
//! This crate provides the Mistral implementation of the `ChatModel` trait,
//! including tool declarations, tool-call parsing and bounded retries.

mod client;
mod config;

#[cfg(test)]
mod tests;

pub use client::MistralClient;
pub use config::MistralConfig;

// Re-export core types for convenience
pub use rnr_core::{ChatModel, ChatRequest, Error, Message, Result, RetryPolicy, ToolChoice};
