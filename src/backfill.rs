//! Historical seeding of the record store

use crate::config::EngineConfig;
use crate::engine::ingest::coerce_reading;
use crate::engine::{PersistableRecord, RawReading};
use crate::error::Result;
use crate::source::IndexSource;
use crate::storage::RecordStore;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

/// Rows per upsert request
pub const BATCH_SIZE: usize = 500;

/// Earliest day seeded unless told otherwise
pub const HISTORY_START: &str = "2020-01-01";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    /// Readings returned by the source
    pub fetched: usize,
    /// Readings on or after the start date
    pub eligible: usize,
    pub written: usize,
    pub failed_batches: usize,
}

/// Midnight UTC at the start of `date`
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Coerce raw history into records, dropping anything before `since`.
/// Readings with unusable timestamps fall back to the epoch and are dropped too.
pub fn history_records(
    readings: &[RawReading],
    since: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<PersistableRecord> {
    let mut warnings = Vec::new();
    let records: Vec<PersistableRecord> = readings
        .iter()
        .enumerate()
        .map(|(position, raw)| coerce_reading(raw, position, config, &mut warnings))
        .filter(|reading| reading.timestamp >= since)
        .map(|reading| PersistableRecord {
            value: reading.value,
            timestamp_iso: reading.timestamp_iso(),
            classification: reading.classification,
            btc_price: None,
            eth_price: None,
            commentary: None,
        })
        .collect();

    if !warnings.is_empty() {
        tracing::warn!("{} field(s) coerced during backfill", warnings.len());
        for w in &warnings {
            tracing::debug!("{}", w);
        }
    }

    records
}

/// Fetch the full index history and upsert it in batches.
/// A failed batch is logged and skipped; the remaining batches still run.
pub async fn seed(
    index: &dyn IndexSource,
    store: &dyn RecordStore,
    since: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<BackfillSummary> {
    let readings = index.readings(0).await?;
    let records = history_records(&readings, since, config);

    let mut summary = BackfillSummary {
        fetched: readings.len(),
        eligible: records.len(),
        ..Default::default()
    };

    tracing::info!(
        fetched = summary.fetched,
        eligible = summary.eligible,
        store = store.name(),
        "Seeding history"
    );

    for (i, chunk) in records.chunks(BATCH_SIZE).enumerate() {
        match store.upsert_batch(chunk).await {
            Ok(written) => {
                summary.written += written;
                tracing::info!("Batch {} saved ({} rows)", i + 1, written);
            }
            Err(e) => {
                summary.failed_batches += 1;
                tracing::error!("Batch {} failed: {}", i + 1, e);
            }
        }
    }

    Ok(summary)
}
