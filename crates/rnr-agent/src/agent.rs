//! The AGENT / TOOLS loop

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use rnr_core::{
    AppConfig, ChatModel, ChatRequest, DEFAULT_SYSTEM_PROMPT, Message, Result, ToolChoice,
};

use crate::tools::ToolRegistry;

/// Answer used when the model still asks for tools after they were disabled
pub const TOOL_LIMIT_NOTICE: &str =
    "I could not finish looking this up within the allowed number of tool calls. Please try rephrasing the question.";

/// Working state of one exchange
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Latest user utterance
    pub input: String,
    /// Turns of earlier exchanges
    pub chat_history: Vec<Message>,
    /// Turns produced during this exchange: AI turns and tool results
    pub messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(input: impl Into<String>, chat_history: Vec<Message>) -> Self {
        Self {
            input: input.into(),
            chat_history,
            messages: Vec::new(),
        }
    }

    /// The AI turn produced last, if any
    pub fn last_ai_turn(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.role == rnr_core::Role::Ai)
    }
}

/// Outcome of `ConversationAgent::invoke`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    /// Final AI turn
    pub answer: Message,
    /// Every turn of the exchange in order, ending with `answer`
    pub messages: Vec<Message>,
    pub tool_rounds: usize,
    /// The model kept requesting tools past the cap and was made to answer without them
    pub tool_limit_reached: bool,
}

/// Runs one exchange: query the model, run requested tools, repeat until it answers
pub struct ConversationAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    system_prompt: String,
    verbose: bool,
    max_tool_rounds: usize,
}

impl ConversationAgent {
    pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            verbose: false,
            max_tool_rounds: Self::DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn from_config(model: Arc<dyn ChatModel>, tools: ToolRegistry, config: &AppConfig) -> Self {
        Self::new(model, tools)
            .with_system_prompt(config.system_prompt.clone())
            .with_verbose(config.verbose)
            .with_max_tool_rounds(config.max_tool_rounds)
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Echo every turn to stdout as it is produced
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds.max(1);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Whether the latest AI turn asks for tools
    pub fn should_continue(state: &ConversationState) -> bool {
        state.last_ai_turn().is_some_and(Message::has_tool_calls)
    }

    fn request(&self, state: &ConversationState, tool_choice: ToolChoice) -> ChatRequest {
        let mut messages = Vec::with_capacity(state.chat_history.len() + state.messages.len() + 1);
        messages.extend(state.chat_history.iter().cloned());
        messages.push(Message::human(state.input.clone()));
        messages.extend(state.messages.iter().cloned());

        ChatRequest {
            system: self.system_prompt.clone(),
            messages,
            tools: self.tools.specs(),
            tool_choice,
        }
    }

    /// AGENT step: append the model's next turn
    pub async fn run_llm(&self, mut state: ConversationState, tool_choice: ToolChoice) -> Result<ConversationState> {
        let request = self.request(&state, tool_choice);
        let response = self.model.chat(&request).await?;

        if self.verbose {
            println!("{}", response.pretty());
        }
        tracing::debug!(
            model = self.model.model_id(),
            tool_calls = response.tool_calls.len(),
            "model turn"
        );

        state.messages.push(response);
        Ok(state)
    }

    /// TOOLS step: run every pending call of the latest AI turn in order.
    /// Failures become error results for the model to read.
    pub async fn run_tools(&self, mut state: ConversationState) -> ConversationState {
        let calls = match state.last_ai_turn() {
            Some(turn) => turn.tool_calls.clone(),
            None => return state,
        };

        for call in &calls {
            let result = match self.tools.execute(call).await {
                Ok(output) => Message::tool_result(call, output),
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                    Message::tool_error(call, e)
                }
            };

            if self.verbose {
                println!("{}", result.pretty());
            }
            state.messages.push(result);
        }

        state
    }

    /// Run one exchange on top of `chat_history`
    pub async fn invoke(&self, input: &str, chat_history: &[Message]) -> Result<AgentReply> {
        let mut state = ConversationState::new(input, chat_history.to_vec());
        let mut tool_rounds = 0;
        let mut tool_limit_reached = false;

        loop {
            state = self.run_llm(state, ToolChoice::Auto).await?;
            if !Self::should_continue(&state) {
                break;
            }

            if tool_rounds >= self.max_tool_rounds {
                tracing::warn!(
                    max_tool_rounds = self.max_tool_rounds,
                    "tool round limit reached, asking for an answer without tools"
                );
                // The unanswered tool request would leave dangling calls
                state.messages.pop();
                state = self.run_llm(state, ToolChoice::None).await?;
                if let Some(last) = state.messages.last_mut() {
                    if last.has_tool_calls() {
                        tracing::warn!(
                            tool_calls = last.tool_calls.len(),
                            "model requested tools after they were disabled, dropping them"
                        );
                        last.tool_calls.clear();
                        if last.content.trim().is_empty() {
                            last.content = TOOL_LIMIT_NOTICE.to_string();
                        }
                    }
                }
                tool_limit_reached = true;
                break;
            }

            state = self.run_tools(state).await;
            tool_rounds += 1;
        }

        let answer = state
            .messages
            .last()
            .cloned()
            .unwrap_or_else(|| Message::ai(""));

        Ok(AgentReply {
            answer,
            messages: state.messages,
            tool_rounds,
            tool_limit_reached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedModel;
    use crate::tools::{AgentTool, TodayTool};
    use chrono::{TimeZone, Utc};
    use rnr_core::{Error, Role, ToolCall};

    fn today_only() -> ToolRegistry {
        ToolRegistry::new().with_tool(AgentTool::Today(TodayTool::with_clock(Arc::new(|| {
            Utc.with_ymd_and_hms(2024, 7, 5, 19, 0, 0).unwrap()
        }))))
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall::new(id, name, arguments)
    }

    fn tool_turn(calls: Vec<ToolCall>) -> Result<Message> {
        Ok(Message::ai_with_tool_calls("", calls))
    }

    #[tokio::test]
    async fn test_direct_answer_terminates() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(Message::ai("Hello!"))]));
        let agent = ConversationAgent::new(model.clone(), today_only());

        let reply = agent.invoke("hi", &[]).await.unwrap();
        assert_eq!(reply.answer.content, "Hello!");
        assert_eq!(reply.tool_rounds, 0);
        assert_eq!(reply.messages.len(), 1);
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_turn(vec![call("abc123xyz", "get-today-tool", "{}")]),
            Ok(Message::ai("Today is Friday.")),
        ]));
        let agent = ConversationAgent::new(model.clone(), today_only());

        let reply = agent.invoke("What day is it?", &[]).await.unwrap();
        assert_eq!(reply.answer.content, "Today is Friday.");
        assert_eq!(reply.tool_rounds, 1);

        let roles: Vec<Role> = reply.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Ai, Role::Tool, Role::Ai]);
        assert_eq!(reply.messages[1].tool_call_id.as_deref(), Some("abc123xyz"));
        assert!(reply.messages[1].content.contains("Friday"));

        let second = &model.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[0].role, Role::Human);
        assert_eq!(second.messages[2].role, Role::Tool);
        assert_eq!(second.tool_choice, ToolChoice::Auto);
    }

    #[tokio::test]
    async fn test_multiple_calls_keep_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_turn(vec![
                call("first0001", "get-today-tool", "{}"),
                call("second002", "no-such-tool", "{}"),
                call("third0003", "get-today-tool", "{}"),
            ]),
            Ok(Message::ai("done")),
        ]));
        let agent = ConversationAgent::new(model, today_only());

        let reply = agent.invoke("go", &[]).await.unwrap();
        let ids: Vec<&str> = reply.messages[1..4]
            .iter()
            .map(|m| m.tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["first0001", "second002", "third0003"]);
        assert!(!reply.messages[1].is_error);
        assert!(reply.messages[2].is_error);
        assert!(reply.messages[2].content.contains("no-such-tool"));
        assert_eq!(reply.answer.content, "done");
    }

    #[tokio::test]
    async fn test_tool_round_cap_forces_answer() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_turn(vec![call("round0001", "get-today-tool", "{}")]),
            tool_turn(vec![call("round0002", "get-today-tool", "{}")]),
            tool_turn(vec![call("round0003", "get-today-tool", "{}")]),
            Ok(Message::ai("It is Friday.")),
        ]));
        let agent = ConversationAgent::new(model.clone(), today_only()).with_max_tool_rounds(2);

        let reply = agent.invoke("What day is it?", &[]).await.unwrap();
        assert!(reply.tool_limit_reached);
        assert_eq!(reply.tool_rounds, 2);
        assert_eq!(reply.answer.content, "It is Friday.");
        assert!(!reply.messages.iter().any(|m| m.tool_calls.iter().any(|c| c.id == "round0003")));

        let requests = model.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[3].tool_choice, ToolChoice::None);
    }

    #[tokio::test]
    async fn test_forced_answer_never_carries_tool_calls() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_turn(vec![call("round0001", "get-today-tool", "{}")]),
            tool_turn(vec![call("round0002", "get-today-tool", "{}")]),
            tool_turn(vec![call("round0003", "get-today-tool", "{}")]),
        ]));
        let agent = ConversationAgent::new(model.clone(), today_only()).with_max_tool_rounds(1);

        let reply = agent.invoke("What day is it?", &[]).await.unwrap();
        assert!(reply.tool_limit_reached);
        assert!(!reply.answer.has_tool_calls());
        assert_eq!(reply.answer.content, TOOL_LIMIT_NOTICE);
        assert!(!reply.messages.last().unwrap().has_tool_calls());
        assert_eq!(model.requests()[2].tool_choice, ToolChoice::None);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let model = Arc::new(ScriptedModel::new(vec![Err(Error::Upstream {
            status: 503,
            message: "overloaded".to_string(),
        })]));
        let agent = ConversationAgent::new(model, today_only());

        let err = agent.invoke("hi", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_history_is_sent_before_input() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(Message::ai("again"))]));
        let agent = ConversationAgent::new(model.clone(), today_only()).with_system_prompt("Be terse.");

        let history = vec![Message::human("earlier"), Message::ai("reply")];
        agent.invoke("now", &history).await.unwrap();

        let request = &model.requests()[0];
        assert_eq!(request.system, "Be terse.");
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["earlier", "reply", "now"]);
        assert_eq!(request.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_verbose_does_not_change_flow() {
        let script = || {
            vec![
                tool_turn(vec![call("abc123xyz", "get-today-tool", "{}")]),
                Ok(Message::ai("Friday")),
            ]
        };
        let quiet = ConversationAgent::new(Arc::new(ScriptedModel::new(script())), today_only());
        let loud = ConversationAgent::new(Arc::new(ScriptedModel::new(script())), today_only()).with_verbose(true);

        let a = quiet.invoke("day?", &[]).await.unwrap();
        let b = loud.invoke("day?", &[]).await.unwrap();
        assert_eq!(a.messages.len(), b.messages.len());
        assert_eq!(a.answer.content, b.answer.content);
    }
}
