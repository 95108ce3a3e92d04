//! Cortex embeddings

use async_trait::async_trait;
use std::sync::Arc;

use rnr_core::{Embedder, EmbeddingModel, Error, Result, check_dimensions};

use crate::connection::{Binding, SnowflakeConnection, StatementContext};

/// Computes embeddings inside Snowflake with `SNOWFLAKE.CORTEX.EMBED_TEXT_768/1024`
pub struct CortexEmbeddings {
    connection: Arc<SnowflakeConnection>,
    model: EmbeddingModel,
    context: StatementContext,
}

impl CortexEmbeddings {
    /// Cortex functions need a running warehouse, taken from `context`
    pub fn new(connection: Arc<SnowflakeConnection>, model: EmbeddingModel, context: StatementContext) -> Self {
        Self {
            connection,
            model,
            context,
        }
    }

    pub fn model(&self) -> EmbeddingModel {
        self.model
    }

    fn statement(&self) -> String {
        format!(
            "SELECT SNOWFLAKE.CORTEX.EMBED_TEXT_{}(?, ?)",
            self.model.dimensions()
        )
    }
}

#[async_trait]
impl Embedder for CortexEmbeddings {
    fn dimensions(&self) -> usize {
        self.model.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let bindings = [Binding::text(self.model.as_str()), Binding::text(text)];
        let result = self
            .connection
            .execute(&self.statement(), &bindings, &self.context)
            .await?;

        let raw = result
            .first_value()
            .ok_or_else(|| Error::Embedding(format!("{} returned no vector", self.model)))?;

        let vector: Vec<f32> = serde_json::from_str(raw)
            .map_err(|e| Error::Embedding(format!("unreadable vector from {}: {}", self.model, e)))?;

        check_dimensions(self.dimensions(), &vector)
            .map_err(|_| Error::Embedding(format!(
                "{} returned {} values, expected {}",
                self.model,
                vector.len(),
                self.dimensions()
            )))?;

        Ok(vector)
    }
}
