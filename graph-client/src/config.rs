use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::{AccessToken, CredentialsError, TestingData};
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_TESTING_DATA: &str = "graph_data.yml";

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Graph API endpoint
    pub base_url: String,
    pub request_timeout: Duration,

    // Transport retry bound and linear backoff step
    pub retry: RetryPolicy,

    // Credentials
    pub testing_data_path: PathBuf,
    pub access_token: Option<AccessToken>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables (with defaults):
    /// - GRAPH_API_BASE_URL: Graph API host (default: https://graph.facebook.com)
    /// - GRAPH_API_TIMEOUT_SECONDS: Per-request timeout (default: 30)
    /// - GRAPH_API_MAX_RETRIES: Transport retries after the first attempt (default: 2)
    /// - GRAPH_API_RETRY_BACKOFF_MS: Linear backoff step (default: 500)
    /// - GRAPH_TESTING_DATA: YAML file holding oauth_token (default: graph_data.yml)
    /// - GRAPH_ACCESS_TOKEN: Token override; takes precedence over the file
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenv::dotenv().ok();

        let base_url = env::var("GRAPH_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_seconds = env::var("GRAPH_API_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("GRAPH_API_TIMEOUT_SECONDS must be a valid number")?;

        let max_retries = env::var("GRAPH_API_MAX_RETRIES")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<u32>()
            .context("GRAPH_API_MAX_RETRIES must be a valid number")?;

        let backoff_ms = env::var("GRAPH_API_RETRY_BACKOFF_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u64>()
            .context("GRAPH_API_RETRY_BACKOFF_MS must be a valid number")?;

        let testing_data_path = env::var("GRAPH_TESTING_DATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TESTING_DATA));

        let access_token = env::var("GRAPH_ACCESS_TOKEN").ok().and_then(AccessToken::new);

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(timeout_seconds),
            retry: RetryPolicy {
                max_retries,
                backoff_step: Duration::from_millis(backoff_ms),
            },
            testing_data_path,
            access_token,
        })
    }

    /// Defaults pointed at an arbitrary host (mock servers, staging)
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            testing_data_path: PathBuf::from(DEFAULT_TESTING_DATA),
            access_token: None,
        }
    }

    /// Token from GRAPH_ACCESS_TOKEN, falling back to the testing-data file
    pub fn resolve_access_token(&self) -> Result<AccessToken, CredentialsError> {
        match &self.access_token {
            Some(token) => Ok(token.clone()),
            None => TestingData::load(&self.testing_data_path)?.access_token(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("Graph API base URL cannot be empty");
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("Graph API base URL must start with http:// or https://: {}", self.base_url);
        }

        let timeout = self.request_timeout.as_secs();
        if timeout == 0 || timeout > 300 {
            anyhow::bail!("Request timeout must be between 1 and 300 seconds");
        }

        if self.retry.max_retries > 5 {
            anyhow::bail!("At most 5 transport retries are allowed");
        }

        Ok(())
    }
}
