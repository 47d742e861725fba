//! Data storage and persistence
//!
//! Records are keyed by their timestamp; writing the same day twice is a no-op
//! for the daily cycle and an overwrite for historical backfill.

pub mod sqlite;
pub mod stats;
pub mod supabase;


pub use sqlite::SqliteStore;
pub use stats::{summarize, HistoryPeriod, IndexStats};
pub use supabase::SupabaseStore;

use crate::engine::types::to_iso;
use crate::engine::PersistableRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Persistence sink for index records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &'static str;

    /// Insert unless a record with the same timestamp exists; true when written
    async fn persist(&self, record: &PersistableRecord) -> Result<bool>;

    /// Insert or overwrite by timestamp; returns rows written
    async fn upsert_batch(&self, records: &[PersistableRecord]) -> Result<usize>;

    /// Records at or after `from`, newest first
    async fn history_since(&self, from: DateTime<Utc>) -> Result<Vec<PersistableRecord>>;
}

/// Column layout of the `fng_logs` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FngLogRow {
    pub value: i64,
    pub value_classification: String,
    pub timestamp: String,
    #[serde(serialize_with = "rust_decimal::serde::float_option::serialize", default)]
    pub btc_price: Option<Decimal>,
    #[serde(serialize_with = "rust_decimal::serde::float_option::serialize", default)]
    pub eth_price: Option<Decimal>,
    #[serde(default)]
    pub ai_comment: Option<String>,
}

impl From<&PersistableRecord> for FngLogRow {
    fn from(record: &PersistableRecord) -> Self {
        Self {
            value: record.value,
            value_classification: record.classification.clone(),
            timestamp: record.timestamp_iso.clone(),
            btc_price: record.btc_price,
            eth_price: record.eth_price,
            ai_comment: record.commentary.clone(),
        }
    }
}

impl From<FngLogRow> for PersistableRecord {
    fn from(row: FngLogRow) -> Self {
        // Postgres echoes `+00:00`; normalise to the record's `Z` form
        let timestamp_iso = DateTime::parse_from_rfc3339(&row.timestamp)
            .map(|ts| to_iso(ts.with_timezone(&Utc)))
            .unwrap_or(row.timestamp);

        Self {
            value: row.value,
            classification: row.value_classification,
            timestamp_iso,
            btc_price: row.btc_price,
            eth_price: row.eth_price,
            commentary: row.ai_comment,
        }
    }
}
