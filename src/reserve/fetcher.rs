//! Reserve data fetch capability

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::api::http::SecureHttpClient;

/// Upstream data source for reserve payloads and regulatory text
#[async_trait]
pub trait ReserveDataFetcher: Send + Sync {
    /// GET an endpoint and parse the body as JSON
    async fn fetch_json(&self, endpoint: &str) -> Result<Value>;

    /// GET an endpoint and return the raw body
    async fn fetch_text(&self, endpoint: &str) -> Result<String>;
}

/// HTTP-backed fetcher
pub struct HttpReserveFetcher {
    http: SecureHttpClient,
}

impl HttpReserveFetcher {
    pub fn new(http: SecureHttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ReserveDataFetcher for HttpReserveFetcher {
    async fn fetch_json(&self, endpoint: &str) -> Result<Value> {
        let body = self.http.get_text(endpoint).await?;
        serde_json::from_str(&body).context("Reserve endpoint returned invalid JSON")
    }

    async fn fetch_text(&self, endpoint: &str) -> Result<String> {
        self.http.get_text(endpoint).await
    }
}
