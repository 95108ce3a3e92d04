use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use rnr_core::{ChatModel, ChatRequest, Message, Result};

/// A chat model that replays scripted replies and records every request
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Message>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<Message>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: &ChatRequest) -> Result<Message> {
        self.requests.lock().unwrap().push(request.clone());
        // Out of script: answer with an empty final turn
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Message::ai("")))
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}
