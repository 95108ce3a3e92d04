//! Tools the agent can call

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use rnr_core::{Error, Result, ToolCall, ToolSpec};
use rnr_rag::TopicStore;

pub const TODAY_TOOL_NAME: &str = "get-today-tool";
pub const RETRIEVER_TOOL_NAME: &str = "search-vector-store";

/// Dates are reported in Pacific time
pub const TIMEZONE: Tz = chrono_tz::US::Pacific;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Reports today's weekday and timestamp
#[derive(Clone)]
pub struct TodayTool {
    clock: Clock,
}

impl TodayTool {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            TODAY_TOOL_NAME,
            "Useful for getting today's weekday name and today's date. No input required. \
             Output is a pair of the weekday name and the RFC 3339 timestamp.",
            json!({ "type": "object", "properties": {} }),
        )
    }

    /// `["Friday", "2024-07-05T12:00:00-07:00"]`
    pub fn run(&self) -> Result<String> {
        let now = (self.clock)().with_timezone(&TIMEZONE);
        let weekday = now.format("%A").to_string();
        Ok(serde_json::to_string(&(weekday, now.to_rfc3339()))?)
    }
}

impl Default for TodayTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct RetrieverArgs {
    query: String,
}

/// Similarity search over one topic's chunks
#[derive(Clone)]
pub struct RetrieverTool {
    store: TopicStore,
    k: usize,
}

impl RetrieverTool {
    pub const DEFAULT_K: usize = 5;

    pub fn new(store: TopicStore, k: usize) -> Self {
        Self { store, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn spec(&self) -> ToolSpec {
        let topic = self.store.topic();
        ToolSpec::new(
            RETRIEVER_TOOL_NAME,
            format!(
                "Search for information about {topic}. \
                 For any questions about {topic}, you must use this tool. \
                 Use the noun or the phrase most similar to the search."
            ),
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "query to look up in retriever"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    /// JSON array of `{text, metadata}`, best match first; `[]` when nothing is stored
    pub async fn run(&self, arguments: &str) -> Result<String> {
        let args: RetrieverArgs = serde_json::from_str(arguments).map_err(|e| {
            Error::ToolExecution(format!("{} expects {{\"query\": string}}: {}", RETRIEVER_TOOL_NAME, e))
        })?;

        let hits = self.store.similarity_search(&args.query, self.k).await?;
        tracing::debug!(query = %args.query, hits = hits.len(), "retrieved chunks");
        Ok(serde_json::to_string(&hits)?)
    }
}

/// Every tool the agent knows, dispatched by name
#[derive(Clone)]
pub enum AgentTool {
    Today(TodayTool),
    Retriever(RetrieverTool),
}

impl AgentTool {
    pub fn name(&self) -> &'static str {
        match self {
            AgentTool::Today(_) => TODAY_TOOL_NAME,
            AgentTool::Retriever(_) => RETRIEVER_TOOL_NAME,
        }
    }

    pub fn spec(&self) -> ToolSpec {
        match self {
            AgentTool::Today(tool) => tool.spec(),
            AgentTool::Retriever(tool) => tool.spec(),
        }
    }

    pub async fn execute(&self, arguments: &str) -> Result<String> {
        match self {
            AgentTool::Today(tool) => tool.run(),
            AgentTool::Retriever(tool) => tool.run(arguments).await,
        }
    }
}

/// The tools bound to one agent
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<AgentTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Date tool plus retrieval over `store`
    pub fn for_topic(store: TopicStore, k: usize) -> Self {
        Self::new()
            .with_tool(AgentTool::Today(TodayTool::new()))
            .with_tool(AgentTool::Retriever(RetrieverTool::new(store, k)))
    }

    /// Add a tool, replacing any registered under the same name
    pub fn with_tool(mut self, tool: AgentTool) -> Self {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
        self
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(AgentTool::spec).collect()
    }

    pub fn get(&self, name: &str) -> Option<&AgentTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<String> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| Error::ToolExecution(format!("unknown tool '{}'", call.name)))?;
        tool.execute(&call.arguments).await
    }
}
