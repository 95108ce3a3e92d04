//! Handle on an ingested topic

use std::sync::Arc;

use rnr_core::{Embedder, Result, ScoredDocument, VectorStore};

/// A topic's vector store together with the embedder that filled it.
///
/// Queries must be embedded with the same model as the stored chunks, so the two
/// travel together.
#[derive(Clone)]
pub struct TopicStore {
    topic: String,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl TopicStore {
    pub fn new(topic: impl Into<String>, store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            topic: topic.into(),
            store,
            embedder,
        }
    }

    /// Topic as the user typed it
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed `query` and return the `k` nearest chunks, best first
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        self.store.search(&vector, k).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    /// Release the backend connection
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

impl std::fmt::Debug for TopicStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicStore")
            .field("topic", &self.topic)
            .field("table", &self.store.table_name())
            .field("dimensions", &self.store.dimensions())
            .finish()
    }
}
