//! Application configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::embeddings::EmbeddingModel;
use crate::{Error, Result};

pub const DEFAULT_CHAT_MODEL: &str = "mistral-large-latest";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Be concise and accurate.";

/// Tunables for chatting, retrieval and ingestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub chat_model: String,
    pub temperature: f32,
    pub embedding_model: EmbeddingModel,
    /// Number of chunks the retrieval tool returns
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub verbose: bool,
    /// Upper bound on AGENT -> TOOLS rounds in one exchange
    pub max_tool_rounds: usize,
    pub system_prompt: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.1,
            embedding_model: EmbeddingModel::default(),
            top_k: 5,
            chunk_size: 256,
            chunk_overlap: 10,
            verbose: false,
            max_tool_rounds: 8,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables (and a `.env` file if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            chat_model: lookup("CHAT_MODEL").unwrap_or(defaults.chat_model),
            temperature: parse_var(&lookup, "TEMPERATURE", defaults.temperature)?,
            embedding_model: parse_var(&lookup, "EMBEDDING_MODEL", defaults.embedding_model)?,
            top_k: parse_var(&lookup, "TOP_K", defaults.top_k)?,
            chunk_size: parse_var(&lookup, "CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap)?,
            verbose: lookup("VERBOSE")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(defaults.verbose),
            max_tool_rounds: parse_var(&lookup, "MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            system_prompt: lookup("SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the numeric settings against each other
    pub fn validate(&self) -> Result<()> {
        if self.chat_model.trim().is_empty() {
            return Err(Error::Configuration("chat model must not be empty".to_string()));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Configuration(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_tool_rounds == 0 {
            return Err(Error::Configuration("max_tool_rounds must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            Error::Configuration(format!("{} has an invalid value '{}': {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}

/// Read a required variable, failing with a configuration error naming it
pub fn require_var(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("{} environment variable not found", key)))
}
