//! Retrieval-Augmented Generation building blocks
//!
//! This crate turns `.docx` files into searchable chunks: `DocxLoader` extracts the text,
//! `TextSplitter` cuts it into overlapping windows, and `IngestPipeline` embeds and
//! upserts them into a topic's vector store, handing back a `TopicStore`.
//! `LocalVectorStore` and `HashEmbedder` provide an in-memory backend for offline runs.

pub mod docx;
pub mod local_embedder;
pub mod local_store;
pub mod pipeline;
pub mod splitter;
pub mod topic_store;

#[cfg(test)]
mod test_support;

pub use docx::DocxLoader;
pub use local_embedder::HashEmbedder;
pub use local_store::LocalVectorStore;
pub use pipeline::{Backend, IngestPipeline, IngestionReport, LocalStores};
pub use splitter::{TextChunk, TextSplitter};
pub use topic_store::TopicStore;

// Re-export core types for convenience
pub use rnr_core::{
    ChunkRecord, Document, DocumentLoader, Embedder, EmbeddingModel, Error, Result,
    ScoredDocument, VectorStore,
};
