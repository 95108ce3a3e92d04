//! Document loader trait and types

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

/// A raw unit of text read from a source file, before splitting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Reads one file format into documents
///
/// Implementations reject files they do not recognize with `Error::Ingestion`.
pub trait DocumentLoader: Send + Sync {
    /// File extensions (lowercase, without dot) this loader accepts
    fn extensions(&self) -> &[&'static str];

    /// Load the file into one or more documents
    fn load(&self, path: &Path) -> Result<Vec<Document>>;
}
