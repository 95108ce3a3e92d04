//! In-memory vector store

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;

use rnr_core::{
    ChunkRecord, Error, Result, ScoredDocument, VectorStore, check_dimensions, sanitize_topic,
};

#[derive(Default)]
struct Table {
    /// Insertion order doubles as the row id
    rows: Vec<ChunkRecord>,
    ids: HashSet<String>,
}

/// Local in-memory vector store with the same ranking rules as the remote backend
pub struct LocalVectorStore {
    table_name: String,
    dimensions: usize,
    table: RwLock<Table>,
}

impl LocalVectorStore {
    pub fn new(topic: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            table_name: sanitize_topic(topic)?,
            dimensions,
            table: RwLock::new(Table::default()),
        })
    }

    /// Cosine similarity; zero when either side has no direction
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize> {
        for record in &records {
            check_dimensions(self.dimensions, &record.embedding)?;
        }

        let mut table = self
            .table
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut inserted = 0;
        for record in records {
            if table.ids.insert(record.id.clone()) {
                table.rows.push(record);
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(self.dimensions, vector)?;

        let table = self
            .table
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut scored: Vec<(f32, &ChunkRecord)> = table
            .rows
            .iter()
            .map(|row| (Self::cosine_similarity(vector, &row.embedding), row))
            .collect();

        // Stable sort: equal scores stay in insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, row)| ScoredDocument::new(row.text.clone(), row.metadata.clone(), score as f64))
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let table = self
            .table
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(table.rows.len())
    }
}
