//! Vector store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// A chunk ready to be written: text, metadata and its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    /// Deduplication identifier, upserts are no-ops when it already exists
    pub id: String,
    pub text: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// A search hit. `metadata["score"]` holds the similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredDocument {
    pub text: String,
    pub metadata: Value,
}

impl ScoredDocument {
    /// Build a hit, appending `score` to the stored metadata
    pub fn new(text: impl Into<String>, metadata: Value, score: f64) -> Self {
        let mut metadata = match metadata {
            Value::Object(map) => Value::Object(map),
            Value::Null => Value::Object(Default::default()),
            other => serde_json::json!({ "value": other }),
        };
        metadata["score"] = serde_json::json!(score);
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn score(&self) -> Option<f64> {
        self.metadata.get("score").and_then(Value::as_f64)
    }
}

/// Trait for vector stores keyed by topic
///
/// Ranking is by cosine similarity, highest first. Ties keep insertion order.
/// Scores annotate results and are never used to filter them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Sanitized physical name of the backing table
    fn table_name(&self) -> &str;

    /// Dimensionality every stored vector must have
    fn dimensions(&self) -> usize;

    /// Create whatever backing objects the store needs. Idempotent.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Insert records whose ids are not stored yet. Returns how many rows were added.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize>;

    /// Top-`k` most similar chunks to `vector`
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Number of stored chunks
    async fn count(&self) -> Result<usize>;

    /// Release backend resources. Stores without any keep the default.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Turn a free-form topic into a valid identifier: lowercase, spaces and hyphens
/// become underscores, anything else non-alphanumeric is dropped.
pub fn sanitize_topic(topic: &str) -> Result<String> {
    let mut name: String = topic
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' | '_' => Some('_'),
            c if c.is_ascii_alphanumeric() => Some(c),
            _ => None,
        })
        .collect();

    if name.trim_matches('_').is_empty() {
        return Err(Error::Configuration(format!(
            "topic '{}' does not contain any usable characters",
            topic
        )));
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "t_");
    }

    Ok(name)
}

/// Ensure a vector has the dimensionality a store expects
pub fn check_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::VectorStore(format!(
            "expected a vector of dimension {}, got {}",
            expected,
            vector.len()
        )));
    }
    Ok(())
}
