//! Local SQLite record store

use super::RecordStore;
use crate::engine::types::to_iso;
use crate::engine::PersistableRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// `fng_logs` in a SQLite file
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fng_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                value INTEGER NOT NULL,
                value_classification TEXT NOT NULL,
                timestamp TEXT NOT NULL UNIQUE,
                btc_price TEXT,
                eth_price TEXT,
                ai_comment TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fng_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn persist(&self, record: &PersistableRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO fng_logs (value, value_classification, timestamp, btc_price, eth_price, ai_comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(timestamp) DO NOTHING
            "#,
        )
        .bind(record.value)
        .bind(&record.classification)
        .bind(&record.timestamp_iso)
        .bind(record.btc_price.map(|p| p.to_string()))
        .bind(record.eth_price.map(|p| p.to_string()))
        .bind(&record.commentary)
        .bind(to_iso(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn upsert_batch(&self, records: &[PersistableRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO fng_logs (value, value_classification, timestamp, btc_price, eth_price, ai_comment, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(timestamp) DO UPDATE SET
                    value = excluded.value,
                    value_classification = excluded.value_classification,
                    btc_price = COALESCE(excluded.btc_price, fng_logs.btc_price),
                    eth_price = COALESCE(excluded.eth_price, fng_logs.eth_price),
                    ai_comment = COALESCE(excluded.ai_comment, fng_logs.ai_comment)
                "#,
            )
            .bind(record.value)
            .bind(&record.classification)
            .bind(&record.timestamp_iso)
            .bind(record.btc_price.map(|p| p.to_string()))
            .bind(record.eth_price.map(|p| p.to_string()))
            .bind(&record.commentary)
            .bind(to_iso(Utc::now()))
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn history_since(&self, from: DateTime<Utc>) -> Result<Vec<PersistableRecord>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT value, value_classification, timestamp, btc_price, eth_price, ai_comment
            FROM fng_logs
            WHERE timestamp >= ?
            ORDER BY timestamp DESC
            "#,
        )
        .bind(to_iso(from))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp = row.timestamp.clone();
            match PersistableRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(%timestamp, "Skipping unreadable history row: {}", e),
            }
        }
        Ok(records)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    value: i64,
    value_classification: String,
    timestamp: String,
    btc_price: Option<String>,
    eth_price: Option<String>,
    ai_comment: Option<String>,
}

impl TryFrom<LogRow> for PersistableRecord {
    type Error = anyhow::Error;

    fn try_from(row: LogRow) -> std::result::Result<Self, Self::Error> {
        Ok(PersistableRecord {
            value: row.value,
            classification: row.value_classification,
            timestamp_iso: row.timestamp,
            btc_price: row.btc_price.map(|p| p.parse::<Decimal>()).transpose()?,
            eth_price: row.eth_price.map(|p| p.parse::<Decimal>()).transpose()?,
            commentary: row.ai_comment,
        })
    }
}
