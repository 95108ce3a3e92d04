//! Snowflake integration for RAG 'n' Roll
//!
//! Talks to the Snowflake SQL API over HTTPS. One `SnowflakeConnection` is opened per
//! chat session and shared (through `Arc`) by `CortexEmbeddings`, which computes
//! vectors with the Cortex `EMBED_TEXT_*` functions, and `SnowflakeVectorStore`, which
//! keeps chunks in a `VECTOR` column and ranks them with `VECTOR_COSINE_SIMILARITY`.

mod config;
mod connection;
mod embeddings;
mod vector_store;


pub use config::SnowflakeConfig;
pub use connection::{Binding, SnowflakeConnection, StatementContext, StatementResult};
pub use embeddings::CortexEmbeddings;
pub use vector_store::SnowflakeVectorStore;

// Re-export core types for convenience
pub use rnr_core::{Embedder, EmbeddingModel, Error, Result, VectorStore};
