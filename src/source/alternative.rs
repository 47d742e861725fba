//! Alternative.me Fear & Greed Index client

use super::IndexSource;
use crate::engine::RawReading;
use crate::error::{AlertError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Client for `GET /fng/`
#[derive(Clone)]
pub struct FngClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<RawReading>,
    metadata: Option<FngMetadata>,
}

#[derive(Debug, Deserialize)]
struct FngMetadata {
    error: Option<String>,
}

impl FngClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Latest `limit` readings, newest first
    pub async fn fetch(&self, limit: usize) -> Result<Vec<RawReading>> {
        let url = format!("{}/fng/", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string()), ("format", "json".to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AlertError::Api(format!(
                "Fear & Greed API returned {}",
                response.status()
            )));
        }

        let body: FngResponse = response.json().await?;
        if let Some(error) = body.metadata.and_then(|m| m.error) {
            return Err(AlertError::Api(format!("Fear & Greed API error: {}", error)));
        }

        tracing::debug!("Fetched {} index readings", body.data.len());
        Ok(body.data)
    }
}

#[async_trait]
impl IndexSource for FngClient {
    async fn readings(&self, limit: usize) -> Result<Vec<RawReading>> {
        self.fetch(limit).await
    }
}
