//! HTTP transport for chain REST and indexer endpoints.
//!
//! The query cache only talks to the [`Transport`] trait so tests can script
//! responses without a network.

use crate::error::ChainError;
use async_trait::async_trait;
use std::time::Duration;

/// Default request timeout for REST calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Raw JSON transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a URL and return the decoded JSON body.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, ChainError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
}

impl RestClient {
    pub fn new() -> Result<Self, ChainError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("astra-wallet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, ChainError> {
        tracing::debug!("GET {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("GET {} returned {}", url, status);
            return Err(ChainError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.json::<serde_json::Value>().await?;
        Ok(body)
    }
}
