//! Core traits and types for RAG 'n' Roll
//!
//! This crate defines the fundamental traits and types used across the workspace.
//! It provides capability-facing interfaces for chat models, embedders, vector stores
//! and document loaders, plus the shared error taxonomy, configuration and retry policy,
//! so that adapters can be swapped and the agent can be tested without a network.

pub mod config;
pub mod document_loader;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod message;
pub mod types;
pub mod vector_store;


pub use config::{AppConfig, DEFAULT_CHAT_MODEL, DEFAULT_SYSTEM_PROMPT, require_var};
pub use document_loader::{Document, DocumentLoader};
pub use embeddings::{Embedder, EmbeddingModel};
pub use error::{Error, Result};
pub use llm::{ChatModel, ChatRequest, ToolChoice};
pub use message::{Message, Role, ToolCall, ToolSpec};
pub use types::RetryPolicy;
pub use vector_store::{ChunkRecord, ScoredDocument, VectorStore, check_dimensions, sanitize_topic};
