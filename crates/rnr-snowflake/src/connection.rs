//! Snowflake SQL API connection

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rnr_core::{Error, Result, RetryPolicy};

use crate::config::SnowflakeConfig;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A positional `?` parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Text(String),
    Fixed(i64),
}

impl Binding {
    pub fn text(value: impl Into<String>) -> Self {
        Binding::Text(value.into())
    }

    fn to_json(&self) -> Value {
        match self {
            Binding::Text(value) => json!({ "type": "TEXT", "value": value }),
            Binding::Fixed(value) => json!({ "type": "FIXED", "value": value.to_string() }),
        }
    }
}

/// Database, schema and warehouse a statement runs in.
/// The SQL API keeps no session state between requests, so every call carries it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatementContext {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
}

impl StatementContext {
    /// `<topic>_database`, `<topic>_schema` and `<topic>_warehouse`
    pub fn for_topic(table: &str) -> Self {
        Self {
            database: Some(format!("{}_database", table)),
            schema: Some(format!("{}_schema", table)),
            warehouse: Some(format!("{}_warehouse", table)),
        }
    }

    /// Only the warehouse, for statements that create the database itself
    pub fn warehouse_only(&self) -> Self {
        Self {
            database: None,
            schema: None,
            warehouse: self.warehouse.clone(),
        }
    }
}

/// Rows of a finished statement, every value rendered as a string (or null)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl StatementResult {
    /// First column of the first row
    pub fn first_value(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

#[derive(Deserialize)]
struct StatementResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "statementHandle", default)]
    statement_handle: Option<String>,
    #[serde(rename = "resultSetMetaData", default)]
    meta: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Deserialize)]
struct ResultSetMetaData {
    #[serde(rename = "rowType", default)]
    row_type: Vec<RowType>,
    #[serde(rename = "partitionInfo", default)]
    partition_info: Vec<Value>,
}

#[derive(Deserialize)]
struct RowType {
    name: String,
}

#[derive(Deserialize)]
struct PartitionResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

/// One authenticated channel to Snowflake, opened per chat session.
///
/// Shared by the embedder and the vector store. `close` suspends every warehouse the
/// session used; after that every statement fails.
pub struct SnowflakeConnection {
    config: SnowflakeConfig,
    client: Client,
    retry: RetryPolicy,
    closed: AtomicBool,
    warehouses: Mutex<Vec<String>>,
}

impl SnowflakeConnection {
    pub fn new(config: SnowflakeConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs + 30))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        tracing::info!(account = %config.account, "opened Snowflake connection");

        Ok(Self {
            config,
            client,
            retry: RetryPolicy::default(),
            closed: AtomicBool::new(false),
            warehouses: Mutex::new(Vec::new()),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SnowflakeConfig::from_env()?)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Remember a warehouse so `close` can suspend it
    pub fn register_warehouse(&self, warehouse: &str) {
        let mut warehouses = self.warehouses.lock().unwrap_or_else(|e| e.into_inner());
        if !warehouses.iter().any(|w| w == warehouse) {
            warehouses.push(warehouse.to_string());
        }
    }

    /// Run one SQL statement, retrying transient failures
    pub async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
        context: &StatementContext,
    ) -> Result<StatementResult> {
        if self.is_closed() {
            return Err(Error::Configuration("Snowflake connection is closed".to_string()));
        }

        let body = self.request_body(statement, bindings, context);
        let body = &body;
        tracing::debug!(statement, bindings = bindings.len(), "executing statement");
        self.retry
            .run("snowflake statement", move || self.submit(body))
            .await
    }

    /// Suspend the session's warehouses and refuse further statements
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let warehouses = std::mem::take(&mut *self.warehouses.lock().unwrap_or_else(|e| e.into_inner()));
        for warehouse in warehouses {
            let statement = format!("ALTER WAREHOUSE IF EXISTS {} SUSPEND", warehouse);
            let body = self.request_body(&statement, &[], &StatementContext::default());
            // Already-suspended warehouses reject the statement
            if let Err(e) = self.submit(&body).await {
                tracing::debug!(warehouse = %warehouse, error = %e, "warehouse not suspended");
            }
        }

        tracing::info!(account = %self.config.account, "closed Snowflake connection");
        Ok(())
    }

    fn request_body(&self, statement: &str, bindings: &[Binding], context: &StatementContext) -> Value {
        let mut body = json!({
            "statement": statement,
            "timeout": self.config.timeout_secs,
        });

        if !bindings.is_empty() {
            let bindings: Map<String, Value> = bindings
                .iter()
                .enumerate()
                .map(|(i, binding)| ((i + 1).to_string(), binding.to_json()))
                .collect();
            body["bindings"] = Value::Object(bindings);
        }
        if let Some(database) = &context.database {
            body["database"] = json!(database);
        }
        if let Some(schema) = &context.schema {
            body["schema"] = json!(schema);
        }
        if let Some(warehouse) = &context.warehouse {
            body["warehouse"] = json!(warehouse);
        }
        if let Some(role) = &self.config.role {
            body["role"] = json!(role);
        }
        body
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}{}", self.config.api_url.trim_end_matches('/'), STATEMENTS_PATH, suffix)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Accept", "application/json")
            .header("X-Snowflake-Authorization-Token-Type", &self.config.token_type)
            .bearer_auth(&self.config.token)
    }

    async fn submit(&self, body: &Value) -> Result<StatementResult> {
        let response = self
            .authorized(self.client.post(self.url("")))
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let mut parsed = read_statement(response).await?;

        // 202: still running, poll the handle until it finishes
        let mut polls = 0u64;
        let max_polls = self.config.timeout_secs * 1000 / POLL_INTERVAL.as_millis() as u64;
        while parsed.meta.is_none() && parsed.data.is_empty() {
            let Some(handle) = parsed.statement_handle.clone() else {
                break;
            };
            if polls >= max_polls {
                return Err(Error::Timeout(format!("statement {} did not finish", handle)));
            }
            polls += 1;
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .authorized(self.client.get(self.url(&format!("/{}", handle))))
                .send()
                .await
                .map_err(map_send_error)?;
            parsed = read_statement(response).await?;
        }

        self.collect(parsed).await
    }

    async fn collect(&self, response: StatementResponse) -> Result<StatementResult> {
        let (columns, partitions) = match response.meta {
            Some(meta) => (
                meta.row_type.into_iter().map(|r| r.name).collect(),
                meta.partition_info.len(),
            ),
            None => (Vec::new(), 0),
        };

        let mut rows = response.data;

        if partitions > 1 {
            let handle = response.statement_handle.ok_or_else(|| {
                Error::VectorStore("partitioned result without a statement handle".to_string())
            })?;
            for partition in 1..partitions {
                let response = self
                    .authorized(self.client.get(self.url(&format!("/{}", handle))))
                    .query(&[("partition", partition)])
                    .send()
                    .await
                    .map_err(map_send_error)?;
                let response = check_status(response).await?;
                let page: PartitionResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                rows.extend(page.data);
            }
        }

        Ok(StatementResult { columns, rows })
    }
}

fn map_send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<StatementResponse>(&error_text)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or(error_text);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Authentication(format!("Snowflake rejected the token ({}): {}", status, message))
        }
        StatusCode::UNPROCESSABLE_ENTITY => {
            Error::VectorStore(format!("statement failed: {}", message))
        }
        _ => Error::Upstream {
            status: status.as_u16(),
            message,
        },
    })
}

async fn read_statement(response: Response) -> Result<StatementResponse> {
    let response = check_status(response).await?;
    response
        .json()
        .await
        .map_err(|e| Error::Serialization(e.to_string()))
}
