//! Conversation turns and tool declarations exchanged with the chat model

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
    Tool,
}

/// A request from the model to run a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model. Kept as a string so that
    /// malformed arguments surface at execution time instead of at parse time.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A tool declared to the model: name, natural-language description, JSON schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool turns, correlates the result with its `ToolCall::id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name on tool turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    pub created: i64,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            is_error: false,
            created: Utc::now().timestamp(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn ai_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Ai, content)
        }
    }

    /// Successful output of a tool call
    pub fn tool_result(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::new(Role::Tool, output)
        }
    }

    /// A tool failure folded into the conversation so the model can react to it
    pub fn tool_error(call: &ToolCall, error: impl std::fmt::Display) -> Self {
        Self {
            is_error: true,
            ..Self::tool_result(call, format!("Error: {error}"))
        }
    }

    /// True when this AI turn asks for at least one tool to run
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Ai && !self.tool_calls.is_empty()
    }

    /// Render a turn for verbose echoing
    pub fn pretty(&self) -> String {
        let title = match self.role {
            Role::Human => " Human Message ".to_string(),
            Role::Ai => " Ai Message ".to_string(),
            Role::Tool => format!(" Tool Message ({}) ", self.name.as_deref().unwrap_or("tool")),
        };
        let mut out = format!("{:=^64}\n", title);
        if !self.content.is_empty() {
            out.push_str(&self.content);
            out.push('\n');
        }
        for call in &self.tool_calls {
            out.push_str(&format!("Tool call: {} ({})\n  Args: {}\n", call.name, call.id, call.arguments));
        }
        out
    }
}
