//! Embedding trait

use async_trait::async_trait;

use crate::Result;

/// Turns text into fixed-length vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces
    fn dimensions(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Embedding models the Cortex backend can serve, grouped by output size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingModel {
    ArcticEmbedMV15,
    ArcticEmbedM,
    E5BaseV2,
    ArcticEmbedLV20,
    NvEmbedQa4,
}

impl EmbeddingModel {
    pub const ALL: [EmbeddingModel; 5] = [
        EmbeddingModel::ArcticEmbedMV15,
        EmbeddingModel::ArcticEmbedM,
        EmbeddingModel::E5BaseV2,
        EmbeddingModel::ArcticEmbedLV20,
        EmbeddingModel::NvEmbedQa4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModel::ArcticEmbedMV15 => "snowflake-arctic-embed-m-v1.5",
            EmbeddingModel::ArcticEmbedM => "snowflake-arctic-embed-m",
            EmbeddingModel::E5BaseV2 => "e5-base-v2",
            EmbeddingModel::ArcticEmbedLV20 => "snowflake-arctic-embed-l-v2.0",
            EmbeddingModel::NvEmbedQa4 => "nv-embed-qa-4",
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            EmbeddingModel::ArcticEmbedMV15
            | EmbeddingModel::ArcticEmbedM
            | EmbeddingModel::E5BaseV2 => 768,
            EmbeddingModel::ArcticEmbedLV20 | EmbeddingModel::NvEmbedQa4 => 1024,
        }
    }
}

impl Default for EmbeddingModel {
    fn default() -> Self {
        EmbeddingModel::E5BaseV2
    }
}

impl std::fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingModel {
    type Err = crate::Error;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == name)
            .ok_or_else(|| crate::Error::Configuration(format!("The model: {} is not supported.", name)))
    }
}

impl serde::Serialize for EmbeddingModel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for EmbeddingModel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_model_dimensions() {
        assert_eq!("e5-base-v2".parse::<EmbeddingModel>().unwrap().dimensions(), 768);
        assert_eq!("snowflake-arctic-embed-m".parse::<EmbeddingModel>().unwrap().dimensions(), 768);
        assert_eq!("snowflake-arctic-embed-m-v1.5".parse::<EmbeddingModel>().unwrap().dimensions(), 768);
        assert_eq!("snowflake-arctic-embed-l-v2.0".parse::<EmbeddingModel>().unwrap().dimensions(), 1024);
        assert_eq!("nv-embed-qa-4".parse::<EmbeddingModel>().unwrap().dimensions(), 1024);
    }

    #[test]
    fn test_unsupported_model_is_configuration_error() {
        let err = "text-embedding-3-small".parse::<EmbeddingModel>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("text-embedding-3-small"));
    }

    #[test]
    fn test_names_round_trip() {
        for model in EmbeddingModel::ALL {
            assert_eq!(model.as_str().parse::<EmbeddingModel>().unwrap(), model);
        }
    }
}
