//! Snowflake-backed vector store

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

use rnr_core::{
    ChunkRecord, Error, Result, ScoredDocument, VectorStore, check_dimensions, sanitize_topic,
};

use crate::connection::{Binding, SnowflakeConnection, StatementContext, StatementResult};

/// Chunks of one topic, stored in table `<topic>` of `<topic>_database.<topic>_schema`
pub struct SnowflakeVectorStore {
    connection: Arc<SnowflakeConnection>,
    table: String,
    dimensions: usize,
    context: StatementContext,
    ready: OnceCell<()>,
}

impl SnowflakeVectorStore {
    pub fn new(connection: Arc<SnowflakeConnection>, topic: &str, dimensions: usize) -> Result<Self> {
        let table = sanitize_topic(topic)?;
        let context = StatementContext::for_topic(&table);
        if let Some(warehouse) = &context.warehouse {
            connection.register_warehouse(warehouse);
        }

        Ok(Self {
            connection,
            table,
            dimensions,
            context,
            ready: OnceCell::new(),
        })
    }

    /// Database, schema and warehouse this store runs in
    pub fn context(&self) -> &StatementContext {
        &self.context
    }

    /// Create warehouse, database, schema and table if they are missing
    pub async fn ensure_table(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                for (statement, context) in self.setup_statements() {
                    self.connection.execute(&statement, &[], &context).await?;
                }
                tracing::info!(table = %self.table, dimensions = self.dimensions, "vector table ready");
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    fn setup_statements(&self) -> Vec<(String, StatementContext)> {
        let none = StatementContext::default();
        let database = format!("{}_database", self.table);
        let schema = format!("{}_schema", self.table);
        let warehouse = format!("{}_warehouse", self.table);

        vec![
            (
                format!(
                    "CREATE WAREHOUSE IF NOT EXISTS {} WITH WAREHOUSE_SIZE = 'X-SMALL' \
                     AUTO_SUSPEND = 120 AUTO_RESUME = TRUE INITIALLY_SUSPENDED = TRUE",
                    warehouse
                ),
                none.clone(),
            ),
            (
                format!("CREATE DATABASE IF NOT EXISTS {}", database),
                self.context.warehouse_only(),
            ),
            (
                format!("CREATE SCHEMA IF NOT EXISTS {}.{}", database, schema),
                self.context.warehouse_only(),
            ),
            (
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (ID INTEGER AUTOINCREMENT, UUID STRING, \
                     TEXT VARCHAR, METADATA VARCHAR, EMBEDDINGS VECTOR(FLOAT, {}))",
                    self.table, self.dimensions
                ),
                self.context.clone(),
            ),
        ]
    }

    fn merge_statement(&self) -> String {
        format!(
            "MERGE INTO {table} AS orig \
             USING (SELECT ? AS UUID, ? AS TEXT, ? AS METADATA, \
             PARSE_JSON(?)::ARRAY::VECTOR(FLOAT, {dim}) AS EMBEDDINGS) AS new \
             ON new.UUID = orig.UUID \
             WHEN NOT MATCHED THEN INSERT (UUID, TEXT, METADATA, EMBEDDINGS) \
             VALUES (new.UUID, new.TEXT, new.METADATA, new.EMBEDDINGS)",
            table = self.table,
            dim = self.dimensions
        )
    }

    fn search_statement(&self) -> String {
        format!(
            "SELECT TEXT, METADATA, \
             VECTOR_COSINE_SIMILARITY(EMBEDDINGS, PARSE_JSON(?)::ARRAY::VECTOR(FLOAT, {dim})) AS SCORE \
             FROM {table} ORDER BY SCORE DESC, ID ASC LIMIT ?",
            table = self.table,
            dim = self.dimensions
        )
    }
}

#[async_trait]
impl VectorStore for SnowflakeVectorStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.ensure_table().await
    }

    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize> {
        for record in &records {
            check_dimensions(self.dimensions, &record.embedding)?;
        }
        self.ensure_table().await?;

        let statement = self.merge_statement();
        let mut inserted = 0;
        for record in records {
            let bindings = [
                Binding::Text(record.id),
                Binding::Text(record.text),
                Binding::Text(record.metadata.to_string()),
                Binding::Text(serde_json::to_string(&record.embedding)?),
            ];
            let result = self.connection.execute(&statement, &bindings, &self.context).await?;
            inserted += parse_count(&result)?;
        }

        tracing::debug!(table = %self.table, inserted, "merged chunks");
        Ok(inserted)
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(self.dimensions, vector)?;
        self.ensure_table().await?;

        let bindings = [
            Binding::Text(serde_json::to_string(vector)?),
            Binding::Fixed(k as i64),
        ];
        let result = self
            .connection
            .execute(&self.search_statement(), &bindings, &self.context)
            .await?;

        result.rows.into_iter().map(to_scored_document).collect()
    }

    async fn count(&self) -> Result<usize> {
        self.ensure_table().await?;
        let statement = format!("SELECT COUNT(*) FROM {}", self.table);
        let result = self.connection.execute(&statement, &[], &self.context).await?;
        parse_count(&result)
    }

    async fn close(&self) -> Result<()> {
        self.connection.close().await
    }
}

fn parse_count(result: &StatementResult) -> Result<usize> {
    match result.first_value() {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::VectorStore(format!("expected a row count, got '{}'", raw))),
        None => Ok(0),
    }
}

fn to_scored_document(row: Vec<Option<String>>) -> Result<ScoredDocument> {
    let mut cells = row.into_iter();
    let text = cells.next().flatten().unwrap_or_default();
    let metadata = match cells.next().flatten() {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        None => Value::Null,
    };
    let score = cells
        .next()
        .flatten()
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| Error::VectorStore(format!("unreadable similarity score '{}'", raw)))
        })
        .transpose()?
        .unwrap_or(0.0);

    Ok(ScoredDocument::new(text, metadata, score))
}
