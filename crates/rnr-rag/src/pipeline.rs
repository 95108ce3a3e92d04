//! Document ingestion: load, split, embed, upsert

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rnr_core::{
    AppConfig, ChunkRecord, DocumentLoader, Embedder, EmbeddingModel, Error, Result,
    VectorStore,
};
use rnr_snowflake::{CortexEmbeddings, SnowflakeConnection, SnowflakeVectorStore};

use crate::docx::DocxLoader;
use crate::local_embedder::HashEmbedder;
use crate::local_store::LocalVectorStore;
use crate::splitter::TextSplitter;
use crate::topic_store::TopicStore;

/// Where a topic's chunks live
pub enum Backend {
    /// Snowflake tables with Cortex embeddings over a session connection
    Snowflake(Arc<SnowflakeConnection>),
    /// In-memory stores with hashed embeddings, kept per topic for the process lifetime
    Local(LocalStores),
}

impl Backend {
    pub fn local() -> Self {
        Backend::Local(LocalStores::default())
    }
}

/// Registry of in-memory stores so reopening a topic finds its chunks
#[derive(Default)]
pub struct LocalStores {
    stores: Mutex<HashMap<String, Arc<LocalVectorStore>>>,
}

impl LocalStores {
    fn open(&self, topic: &str, dimensions: usize) -> Result<Arc<LocalVectorStore>> {
        let store = LocalVectorStore::new(topic, dimensions)?;
        let mut stores = self
            .stores
            .lock()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        let existing = stores
            .entry(store.table_name().to_string())
            .or_insert_with(|| Arc::new(store))
            .clone();

        if existing.dimensions() != dimensions {
            return Err(Error::Configuration(format!(
                "topic '{}' holds {}-dimensional vectors, the embedding model produces {}",
                topic,
                existing.dimensions(),
                dimensions
            )));
        }
        Ok(existing)
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionReport {
    pub source: String,
    /// Raw document units produced by the loader
    pub units: usize,
    pub chunks: usize,
    /// Chunks that were not stored yet
    pub inserted: usize,
}

/// Builds and fills the vector store of one topic
pub struct IngestPipeline {
    topic: String,
    model: EmbeddingModel,
    splitter: TextSplitter,
    loaders: Vec<Box<dyn DocumentLoader>>,
    backend: Backend,
}

impl IngestPipeline {
    /// Fails with `Error::Configuration` for an unknown embedding model, an empty
    /// topic or bad chunk settings, before touching the backend.
    pub fn new(topic: &str, embedding_model: &str, splitter: TextSplitter, backend: Backend) -> Result<Self> {
        if topic.trim().is_empty() {
            return Err(Error::Configuration("a topic is required before ingesting".to_string()));
        }
        let model: EmbeddingModel = embedding_model.parse()?;

        Ok(Self {
            topic: topic.trim().to_string(),
            model,
            splitter,
            loaders: vec![Box::new(DocxLoader::new())],
            backend,
        })
    }

    pub fn from_config(topic: &str, config: &AppConfig, backend: Backend) -> Result<Self> {
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        Self::new(topic, config.embedding_model.as_str(), splitter, backend)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn model(&self) -> EmbeddingModel {
        self.model
    }

    /// Load `path`, then chunk, embed and upsert it into the topic's store
    pub async fn ingest(&self, path: &Path) -> Result<(TopicStore, IngestionReport)> {
        let loader = self.loader_for(path)?;
        let documents = loader.load(path)?;
        let source = path.display().to_string();

        let mut records = Vec::new();
        let mut texts = Vec::new();
        for document in &documents {
            let unit_source = document
                .metadata
                .get("source")
                .and_then(|s| s.as_str())
                .unwrap_or(source.as_str())
                .to_string();

            for (chunk_index, chunk) in self.splitter.split(&document.content).into_iter().enumerate() {
                if chunk.text.trim().is_empty() {
                    continue;
                }
                let mut metadata = document.metadata.clone();
                if !metadata.is_object() {
                    metadata = json!({});
                }
                metadata["source"] = json!(unit_source);
                metadata["chunk_index"] = json!(chunk_index);
                metadata["start_index"] = json!(chunk.start_index);

                records.push(ChunkRecord {
                    id: chunk_id(&unit_source, chunk_index, &chunk.text),
                    text: chunk.text.clone(),
                    metadata,
                    embedding: Vec::new(),
                });
                texts.push(chunk.text);
            }
        }

        let topic_store = self.open_store()?;
        // Embedding statements run inside the topic's warehouse and database
        topic_store.store().ensure_ready().await?;
        let embeddings = topic_store.embedder().embed_many(&texts).await?;
        for (record, embedding) in records.iter_mut().zip(embeddings) {
            record.embedding = embedding;
        }

        let chunks = records.len();
        let inserted = topic_store.store().upsert(records).await?;

        let report = IngestionReport {
            source,
            units: documents.len(),
            chunks,
            inserted,
        };
        tracing::info!(
            topic = %self.topic,
            source = %report.source,
            chunks = report.chunks,
            inserted = report.inserted,
            "ingested document"
        );

        Ok((topic_store, report))
    }

    /// Open the topic's store without ingesting anything
    pub async fn open_existing(&self) -> Result<TopicStore> {
        let topic_store = self.open_store()?;
        topic_store.store().ensure_ready().await?;
        let count = topic_store.count().await?;
        tracing::info!(topic = %self.topic, chunks = count, "opened existing vector store");
        Ok(topic_store)
    }

    fn loader_for(&self, path: &Path) -> Result<&dyn DocumentLoader> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        self.loaders
            .iter()
            .find(|loader| loader.extensions().contains(&extension.as_str()))
            .map(|loader| loader.as_ref())
            .ok_or_else(|| {
                Error::Ingestion(format!(
                    "unsupported file format: {} (only .docx files can be ingested)",
                    path.display()
                ))
            })
    }

    fn open_store(&self) -> Result<TopicStore> {
        let dimensions = self.model.dimensions();

        let (store, embedder): (Arc<dyn VectorStore>, Arc<dyn Embedder>) = match &self.backend {
            Backend::Snowflake(connection) => {
                let store = SnowflakeVectorStore::new(connection.clone(), &self.topic, dimensions)?;
                let embedder =
                    CortexEmbeddings::new(connection.clone(), self.model, store.context().clone());
                (Arc::new(store) as Arc<dyn VectorStore>, Arc::new(embedder) as Arc<dyn Embedder>)
            }
            Backend::Local(stores) => {
                let store = stores.open(&self.topic, dimensions)?;
                (store as Arc<dyn VectorStore>, Arc::new(HashEmbedder::for_model(self.model)) as Arc<dyn Embedder>)
            }
        };

        Ok(TopicStore::new(self.topic.clone(), store, embedder))
    }
}

/// Stable id so re-ingesting the same file inserts nothing new
fn chunk_id(source: &str, chunk_index: usize, text: &str) -> String {
    format!("{:x}", md5::compute(format!("{}:{}:{}", source, chunk_index, text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_docx;

    fn pipeline(topic: &str) -> IngestPipeline {
        IngestPipeline::new(topic, "e5-base-v2", TextSplitter::new(256, 10).unwrap(), Backend::local()).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_thousand_chars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.docx");
        let text = "x".repeat(1000);
        write_docx(&path, &[&text]);

        let (store, report) = pipeline("Long Doc").ingest(&path).await.unwrap();
        assert_eq!(report.chunks, 5);
        assert_eq!(report.inserted, 5);
        assert_eq!(store.count().await.unwrap(), 5);
        assert_eq!(store.store().table_name(), "long_doc");
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.docx");
        write_docx(&path, &["Warehouses auto-suspend after 120 seconds.", "Credits are billed per second."]);

        let pipeline = pipeline("guide");
        let (_, first) = pipeline.ingest(&path).await.unwrap();
        let (store, second) = pipeline.ingest(&path).await.unwrap();

        assert_eq!(first.inserted, first.chunks);
        assert_eq!(second.inserted, 0);
        assert_eq!(store.count().await.unwrap(), first.chunks);
    }

    #[tokio::test]
    async fn test_round_trip_ranks_chunk_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.docx");
        let paragraphs = [
            "Virtual warehouses provide compute for queries.",
            "Time travel keeps historical data for a retention period.",
            "Snowpipe loads files continuously from stages.",
        ];
        write_docx(&path, &paragraphs);

        let pipeline = IngestPipeline::new(
            "faq",
            "e5-base-v2",
            TextSplitter::new(60, 5).unwrap(),
            Backend::local(),
        )
        .unwrap();
        let (store, _) = pipeline.ingest(&path).await.unwrap();

        let hits = store.similarity_search("Time travel keeps historical data", 3).await.unwrap();
        assert!(hits[0].text.contains("Time travel"));
        assert_eq!(hits[0].metadata["source"], path.display().to_string());
        assert!(hits[0].metadata.get("chunk_index").is_some());
        assert!(hits[0].metadata.get("start_index").is_some());
    }

    #[tokio::test]
    async fn test_open_existing_sees_ingested_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.docx");
        write_docx(&path, &["Stages hold files before loading."]);

        let pipeline = pipeline("guide");
        pipeline.ingest(&path).await.unwrap();
        let reopened = pipeline.open_existing().await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);

        let fresh = pipeline_for_other_topic().open_existing().await.unwrap();
        assert_eq!(fresh.count().await.unwrap(), 0);
    }

    fn pipeline_for_other_topic() -> IngestPipeline {
        pipeline("unrelated")
    }

    #[tokio::test]
    async fn test_unsupported_format_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain notes").unwrap();

        let pipeline = pipeline("notes");
        let err = pipeline.ingest(&path).await.unwrap_err();
        assert!(matches!(err, Error::Ingestion(_)));
        assert_eq!(pipeline.open_existing().await.unwrap().count().await.unwrap(), 0);
    }

    #[test]
    fn test_reopening_topic_with_other_model_dimensions_fails() {
        let stores = LocalStores::default();
        let small = stores.open("guide", 768).unwrap();
        assert_eq!(small.dimensions(), 768);
        assert!(Arc::ptr_eq(&small, &stores.open("guide", 768).unwrap()));

        assert!(matches!(stores.open("guide", 1024), Err(Error::Configuration(_))));
        assert_eq!(stores.open("other", 1024).unwrap().dimensions(), 1024);
    }

    #[test]
    fn test_unknown_model_fails_at_construction() {
        let result = IngestPipeline::new("docs", "ada-002", TextSplitter::new(256, 10).unwrap(), Backend::local());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_blank_topic_rejected() {
        let result = IngestPipeline::new("  ", "e5-base-v2", TextSplitter::new(256, 10).unwrap(), Backend::local());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_chunk_ids_are_stable() {
        assert_eq!(chunk_id("a.docx", 0, "text"), chunk_id("a.docx", 0, "text"));
        assert_ne!(chunk_id("a.docx", 0, "text"), chunk_id("a.docx", 1, "text"));
        assert_eq!(chunk_id("a.docx", 0, "text").len(), 32);
    }
}
