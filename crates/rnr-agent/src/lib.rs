//! Conversation agent for RAG 'n' Roll
//!
//! `ConversationAgent` alternates between asking the chat model for the next turn and
//! running the tools it requested, until the model answers without tool calls.
//! `ChatSession` keeps the chat history of one user session around the agent.

pub mod agent;
pub mod session;
pub mod tools;

#[cfg(test)]
pub(crate) mod mock;

pub use agent::{AgentReply, ConversationAgent, ConversationState, TOOL_LIMIT_NOTICE};
pub use session::ChatSession;
pub use tools::{AgentTool, RetrieverTool, TodayTool, ToolRegistry};

// Re-export core types for convenience
pub use rnr_core::{ChatModel, Error, Message, Result, Role, ToolCall};
