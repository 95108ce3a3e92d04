//! Per-user chat session

use std::sync::Arc;
use uuid::Uuid;

use rnr_core::{AppConfig, ChatModel, Message, Result};
use rnr_rag::TopicStore;

use crate::agent::{AgentReply, ConversationAgent};
use crate::tools::ToolRegistry;

/// Chat history, topic store and agent of one session.
///
/// History only grows after an exchange finishes, by the human input and the final
/// answer. A failed exchange leaves it untouched.
pub struct ChatSession {
    id: Uuid,
    store: TopicStore,
    agent: ConversationAgent,
    history: Vec<Message>,
}

impl ChatSession {
    /// Bind the date and retrieval tools for `store` to a new agent
    pub fn new(store: TopicStore, model: Arc<dyn ChatModel>, config: &AppConfig) -> Self {
        let tools = ToolRegistry::for_topic(store.clone(), config.top_k);
        let agent = ConversationAgent::from_config(model, tools, config);
        Self::with_agent(store, agent)
    }

    pub fn with_agent(store: TopicStore, agent: ConversationAgent) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, topic = %store.topic(), "chat session started");
        Self {
            id,
            store,
            agent,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        self.store.topic()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Run one exchange and record it
    pub async fn ask(&mut self, input: &str) -> Result<AgentReply> {
        let reply = self.agent.invoke(input, &self.history).await?;
        self.history.push(Message::human(input));
        self.history.push(reply.answer.clone());
        Ok(reply)
    }

    /// Forget the conversation, keep the store and agent
    pub fn reset(&mut self) {
        self.history.clear();
        tracing::debug!(session = %self.id, "chat history cleared");
    }

    /// Release the backend connection
    pub async fn end_session(self) -> Result<()> {
        tracing::info!(session = %self.id, turns = self.history.len(), "chat session ended");
        self.store.close().await
    }
}
