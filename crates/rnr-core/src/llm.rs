//! Chat model trait and request types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::{Message, ToolSpec};
use crate::Result;

/// Whether the model may call tools on this request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
}

/// Everything the model sees for one completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    /// Prior turns, the current human input and in-flight tool turns, in order
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
}

/// Trait for chat models with tool calling (e.g. Mistral)
///
/// Implementations own their retry policy: a returned error has already
/// exhausted the bounded retries for transient upstream failures.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next AI turn. The returned message has `Role::Ai` and carries
    /// either final text or one or more tool calls.
    async fn chat(&self, request: &ChatRequest) -> Result<Message>;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}
