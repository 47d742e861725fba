//! Supabase (PostgREST) record store

use super::{FngLogRow, RecordStore};
use crate::config::SupabaseConfig;
use crate::engine::types::to_iso;
use crate::engine::PersistableRecord;
use crate::error::{AlertError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

const SELECT_COLUMNS: &str = "value,value_classification,timestamp,btc_price,eth_price,ai_comment";

pub struct SupabaseStore {
    http: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// POST rows with the given conflict resolution; returns rows echoed back
    async fn insert(&self, rows: &[FngLogRow], resolution: &str) -> Result<usize> {
        let request = self
            .http
            .post(self.endpoint())
            .query(&[("on_conflict", "timestamp")])
            .header("Prefer", format!("resolution={},return=representation", resolution))
            .json(rows);

        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AlertError::Api(format!(
                "Supabase insert failed ({}): {}",
                status, error_text
            )));
        }

        let written: Vec<serde_json::Value> = response.json().await?;
        Ok(written.len())
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn persist(&self, record: &PersistableRecord) -> Result<bool> {
        let written = self
            .insert(&[FngLogRow::from(record)], "ignore-duplicates")
            .await?;
        Ok(written > 0)
    }

    async fn upsert_batch(&self, records: &[PersistableRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<FngLogRow> = records.iter().map(FngLogRow::from).collect();
        self.insert(&rows, "merge-duplicates").await
    }

    async fn history_since(&self, from: DateTime<Utc>) -> Result<Vec<PersistableRecord>> {
        let request = self.http.get(self.endpoint()).query(&[
            ("select", SELECT_COLUMNS.to_string()),
            ("order", "timestamp.desc".to_string()),
            ("timestamp", format!("gte.{}", to_iso(from))),
        ]);

        let response = self.authorized(request).send().await?;
        if !response.status().is_success() {
            return Err(AlertError::Api(format!(
                "Supabase query failed: {}",
                response.status()
            )));
        }

        let rows: Vec<FngLogRow> = response.json().await?;
        Ok(rows.into_iter().map(PersistableRecord::from).collect())
    }
}
