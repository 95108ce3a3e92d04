//! Mistral chat-completions client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use rnr_core::{
    ChatModel, ChatRequest, Error, Message, Result, RetryPolicy, Role, ToolCall, ToolChoice,
    ToolSpec,
};

use crate::config::MistralConfig;

/// Mistral chat client with tool calling
pub struct MistralClient {
    config: MistralConfig,
    client: Client,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

#[derive(Serialize)]
pub(crate) struct ChatPayload<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolFunction<'a>,
}

#[derive(Serialize)]
struct WireToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// Usually a JSON-encoded string, occasionally an inline object
    #[serde(default)]
    arguments: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

impl MistralClient {
    /// Model constants
    pub const MISTRAL_LARGE_LATEST: &'static str = "mistral-large-latest";
    pub const MISTRAL_SMALL_LATEST: &'static str = "mistral-small-latest";

    /// Create a new Mistral client from configuration
    pub fn new(config: MistralConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Configuration("Mistral API key must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            config,
            client,
            model: Self::MISTRAL_LARGE_LATEST.to_string(),
            temperature: 0.1,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a new Mistral client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = MistralConfig::from_env()?;
        Self::new(config)
    }

    /// Set the model to use for generation
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Translate a request into the wire payload
    pub(crate) fn build_payload<'a>(&'a self, request: &'a ChatRequest) -> ChatPayload<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: request.system.clone(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        });
        messages.extend(request.messages.iter().map(to_wire_message));

        let tools: Vec<WireTool<'a>> = request.tools.iter().map(to_wire_tool).collect();
        let tool_choice = if tools.is_empty() {
            None
        } else {
            Some(request.tool_choice)
        };

        ChatPayload {
            model: &self.model,
            temperature: self.temperature,
            messages,
            tools,
            tool_choice,
        }
    }

    /// Perform a single chat-completions request
    async fn send(&self, payload: &ChatPayload<'_>) -> Result<Message> {
        let url = format!("{}/v1/chat/completions", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(format!(
                    "Mistral rejected the API key ({}): {}",
                    status, error_text
                )),
                _ => Error::Upstream {
                    status: status.as_u16(),
                    message: error_text,
                },
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        parse_choice(body)
    }
}

#[async_trait]
impl ChatModel for MistralClient {
    async fn chat(&self, request: &ChatRequest) -> Result<Message> {
        let payload = self.build_payload(request);
        let payload = &payload;
        tracing::debug!(
            model = %self.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending chat completion"
        );
        self.retry
            .run("mistral chat completion", move || self.send(payload))
            .await
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn map_send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

fn to_wire_message(message: &Message) -> WireMessage {
    let role = match message.role {
        Role::Human => "user",
        Role::Ai => "assistant",
        Role::Tool => "tool",
    };

    WireMessage {
        role,
        content: message.content.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: Some(call.id.clone()),
                kind: function_kind(),
                function: WireFunctionCall {
                    name: call.name.clone(),
                    arguments: Value::String(call.arguments.clone()),
                },
            })
            .collect(),
        tool_call_id: message.tool_call_id.clone(),
        name: message.name.clone(),
    }
}

fn to_wire_tool(spec: &ToolSpec) -> WireTool<'_> {
    WireTool {
        kind: "function",
        function: WireToolFunction {
            name: &spec.name,
            description: &spec.description,
            parameters: &spec.parameters,
        },
    }
}

/// Mistral content is either a string or a list of typed chunks
fn content_text(content: Option<Value>) -> String {
    match content {
        Some(Value::String(text)) => text,
        Some(Value::Array(chunks)) => chunks
            .iter()
            .filter_map(|chunk| chunk.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

fn parse_choice(body: ChatResponse) -> Result<Message> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::LLMProvider("Mistral returned no choices".to_string()))?;

    if let Some(reason) = &choice.finish_reason {
        if reason == "error" {
            return Err(Error::LLMProvider("Mistral finished with an error".to_string()));
        }
    }

    let text = content_text(choice.message.content);
    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let arguments = match call.function.arguments {
                Value::String(raw) => raw,
                Value::Null => "{}".to_string(),
                other => other.to_string(),
            };
            let id = call.id.filter(|id| !id.is_empty()).unwrap_or_else(fresh_call_id);
            ToolCall::new(id, call.function.name, arguments)
        })
        .collect();

    Ok(Message::ai_with_tool_calls(text, tool_calls))
}

/// Mistral expects nine alphanumeric characters for tool call ids
fn fresh_call_id() -> String {
    Uuid::new_v4().simple().to_string()[..9].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request(tools: Vec<ToolSpec>) -> ChatRequest {
        ChatRequest {
            system: "You are a helpful assistant.".to_string(),
            messages: vec![Message::human("What day is it?")],
            tools,
            tool_choice: ToolChoice::Auto,
        }
    }

    fn today_tool() -> ToolSpec {
        ToolSpec::new("get-today-tool", "Today's weekday and date", json!({"type": "object", "properties": {}}))
    }

    fn client_for(server: &mockito::Server) -> MistralClient {
        let config = MistralConfig::new("test_key").with_api_url(server.url());
        MistralClient::new(config)
            .unwrap()
            .with_retry_policy(RetryPolicy::immediate(2))
    }

    #[tokio::test]
    async fn test_plain_text_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test_key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "It is Friday."},
                        "finish_reason": "stop"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let reply = client_for(&server).chat(&request(vec![])).await.unwrap();
        assert_eq!(reply.role, Role::Ai);
        assert_eq!(reply.content, "It is Friday.");
        assert!(!reply.has_tool_calls());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_tool_call_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "mistral-large-latest",
                "tool_choice": "auto",
                "tools": [{"type": "function", "function": {"name": "get-today-tool"}}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": "",
                            "tool_calls": [
                                {"id": "abc123xyz", "function": {"name": "get-today-tool", "arguments": "{}"}},
                                {"function": {"name": "search-vector-store", "arguments": {"query": "warehouse"}}}
                            ]
                        },
                        "finish_reason": "tool_calls"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let reply = client_for(&server).chat(&request(vec![today_tool()])).await.unwrap();
        assert!(reply.has_tool_calls());
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].id, "abc123xyz");
        assert_eq!(reply.tool_calls[0].arguments, "{}");
        assert_eq!(reply.tool_calls[1].name, "search-vector-store");
        assert_eq!(reply.tool_calls[1].id.len(), 9);
        let args: Value = serde_json::from_str(&reply.tool_calls[1].arguments).unwrap();
        assert_eq!(args["query"], "warehouse");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_twice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("upstream overloaded")
            .expect(3)
            .create_async()
            .await;

        let err = client_for(&server).chat(&request(vec![])).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_body("invalid tool schema")
            .expect(1)
            .create_async()
            .await;

        let err = client_for(&server).chat(&request(vec![])).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 400, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_key_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let err = client_for(&server).chat(&request(vec![])).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_payload_maps_roles_and_tool_turns() {
        let config = MistralConfig::new("k");
        let client = MistralClient::new(config).unwrap().with_model("mistral-small-latest");

        let call = ToolCall::new("abc123xyz", "get-today-tool", "{}");
        let request = ChatRequest {
            system: "sys".to_string(),
            messages: vec![
                Message::human("hi"),
                Message::ai_with_tool_calls("", vec![call.clone()]),
                Message::tool_result(&call, "Friday"),
            ],
            tools: vec![],
            tool_choice: ToolChoice::None,
        };

        let payload = serde_json::to_value(client.build_payload(&request)).unwrap();
        assert_eq!(payload["model"], "mistral-small-latest");
        let roles: Vec<&str> = payload["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);
        assert_eq!(payload["messages"][2]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(payload["messages"][3]["tool_call_id"], "abc123xyz");
        assert!(payload.get("tools").is_none());
        assert!(payload.get("tool_choice").is_none());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            MistralClient::new(MistralConfig::new("  ")),
            Err(Error::Configuration(_))
        ));
    }
}
