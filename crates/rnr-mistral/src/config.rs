//! Mistral configuration

use rnr_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_API_URL: &str = "https://api.mistral.ai";

/// Configuration for the Mistral client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MistralConfig {
    pub api_key: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl MistralConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("MISTRAL_API_KEY").map_err(|_| {
            Error::Configuration("MISTRAL_API_KEY environment variable not found".to_string())
        })?;

        let api_url = env::var("MISTRAL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let timeout_secs = match env::var("MISTRAL_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Configuration(format!("MISTRAL_TIMEOUT_SECS must be an integer, got '{}'", raw))
            })?,
            Err(_) => 60,
        };

        Ok(Self {
            api_key,
            api_url,
            timeout_secs,
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 60,
        }
    }

    /// Point the client at another host, e.g. a proxy or a test server
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}
