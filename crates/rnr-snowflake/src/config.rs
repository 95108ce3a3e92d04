//! Snowflake configuration

use rnr_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_TOKEN_TYPE: &str = "PROGRAMMATIC_ACCESS_TOKEN";

/// Configuration for the Snowflake SQL API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    /// Account identifier, e.g. `myorg-myaccount`
    pub account: String,
    pub token: String,
    /// Value of the `X-Snowflake-Authorization-Token-Type` header
    pub token_type: String,
    pub role: Option<String>,
    pub api_url: String,
    /// Server-side statement timeout
    pub timeout_secs: u64,
}

impl SnowflakeConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let account = env::var("SNOWFLAKE_ACCOUNT").map_err(|_| {
            Error::Configuration("SNOWFLAKE_ACCOUNT environment variable not found".to_string())
        })?;

        let token = env::var("SNOWFLAKE_TOKEN").map_err(|_| {
            Error::Configuration("SNOWFLAKE_TOKEN environment variable not found".to_string())
        })?;

        let mut config = Self::new(account, token);

        if let Ok(token_type) = env::var("SNOWFLAKE_TOKEN_TYPE") {
            config.token_type = token_type;
        }
        config.role = env::var("SNOWFLAKE_ROLE").ok().filter(|r| !r.trim().is_empty());
        if let Ok(api_url) = env::var("SNOWFLAKE_API_URL") {
            config.api_url = api_url;
        }

        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        let account = account.into();
        let api_url = format!("https://{}.snowflakecomputing.com", account.to_lowercase());
        Self {
            account,
            token: token.into(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            role: None,
            api_url,
            timeout_secs: 60,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            return Err(Error::Configuration("Snowflake account must not be empty".to_string()));
        }
        if self.token.trim().is_empty() {
            return Err(Error::Configuration("Snowflake token must not be empty".to_string()));
        }
        Ok(())
    }
}
