//! One ingestion cycle end to end, and the daily schedule around it
//!
//! fetch readings -> enrich (prices, commentary) -> engine -> stores -> sinks.
//! Only a failed index fetch aborts the cycle; every other collaborator is
//! best effort and its failure is logged.

use crate::commentary::CommentarySource;
use crate::config::ScheduleConfig;
use crate::engine::{AlertEngine, CycleFailure, CycleOutcome, MarketContext, RawBatch, RawReading};
use crate::error::{AlertError, Result};
use crate::notify::{failure_message, AlertSink};
use crate::source::{IndexSource, PriceSource, SpotPrices};
use crate::storage::RecordStore;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Today and yesterday
const READINGS_PER_CYCLE: usize = 2;

/// Result of one cycle plus what the sinks did with it
#[derive(Debug, Clone)]
pub struct JobRun {
    pub outcome: CycleOutcome,
    /// Stores that newly wrote the record
    pub persisted: usize,
    /// Sinks that accepted a message
    pub delivered: usize,
}

pub struct AlertJob {
    engine: AlertEngine,
    index: Arc<dyn IndexSource>,
    prices: Option<Arc<dyn PriceSource>>,
    commentary: Option<Arc<dyn CommentarySource>>,
    stores: Vec<Arc<dyn RecordStore>>,
    sinks: Vec<Arc<dyn AlertSink>>,
    notify_failures: bool,
}

impl AlertJob {
    pub fn new(engine: AlertEngine, index: Arc<dyn IndexSource>) -> Self {
        Self {
            engine,
            index,
            prices: None,
            commentary: None,
            stores: Vec::new(),
            sinks: Vec::new(),
            notify_failures: false,
        }
    }

    pub fn with_prices(mut self, prices: Arc<dyn PriceSource>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn with_commentary(mut self, commentary: Arc<dyn CommentarySource>) -> Self {
        self.commentary = Some(commentary);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.stores.push(store);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Send an operator notice through the sinks when a cycle fails
    pub fn notify_failures(mut self, enabled: bool) -> Self {
        self.notify_failures = enabled;
        self
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    /// Run a single cycle stamped with `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> JobRun {
        let outcome = match self.index.readings(READINGS_PER_CYCLE).await {
            Ok(readings) => {
                let context = self.market_context(&readings).await;
                let batch = RawBatch {
                    readings,
                    market_context: Some(context.into()),
                };
                self.engine.run_batch(&batch, now)
            }
            Err(e) => {
                tracing::error!("Failed to fetch index readings: {}", e);
                CycleOutcome::Failed(CycleFailure::new(e.to_string(), now))
            }
        };

        let persisted = self.persist(&outcome).await;
        let delivered = self.deliver(&outcome).await;

        JobRun {
            outcome,
            persisted,
            delivered,
        }
    }

    async fn market_context(&self, readings: &[RawReading]) -> MarketContext {
        let prices = match &self.prices {
            Some(source) => source.spot_prices().await.unwrap_or_else(|e| {
                tracing::warn!("Price fetch failed, continuing without prices: {}", e);
                SpotPrices::default()
            }),
            None => SpotPrices::default(),
        };

        let commentary = match (&self.commentary, readings.first()) {
            (Some(source), Some(today)) => match source.commentary(today, &prices).await {
                Ok(note) => Some(note),
                Err(e) => {
                    tracing::warn!("Commentary unavailable: {}", e);
                    None
                }
            },
            _ => None,
        };

        MarketContext {
            btc_price: prices.btc,
            eth_price: prices.eth,
            commentary,
        }
    }

    async fn persist(&self, outcome: &CycleOutcome) -> usize {
        let Some(record) = outcome.record() else {
            return 0;
        };

        let mut persisted = 0;
        for store in &self.stores {
            match store.persist(record).await {
                Ok(true) => {
                    tracing::info!(store = store.name(), timestamp = %record.timestamp_iso, "Record saved");
                    persisted += 1;
                }
                Ok(false) => {
                    tracing::debug!(store = store.name(), timestamp = %record.timestamp_iso, "Record already stored");
                }
                Err(e) => {
                    tracing::error!(store = store.name(), "Failed to persist record: {}", e);
                }
            }
        }
        persisted
    }

    async fn deliver(&self, outcome: &CycleOutcome) -> usize {
        let message = match outcome {
            CycleOutcome::Completed(report) if report.should_alert => report.message.clone(),
            CycleOutcome::Failed(failure) if self.notify_failures => failure_message(&failure.reason),
            _ => return 0,
        };

        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.deliver(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!("Failed to deliver alert: {}", e),
            }
        }
        delivered
    }

    /// Run every day at the scheduled local time. Only returns on a schedule error.
    pub async fn run_daily(&self, schedule: &ScheduleConfig) -> Result<()> {
        let tz = self.engine.config().timezone;

        loop {
            let next = next_run_after(Utc::now(), schedule, tz)?;
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tracing::info!(
                next_run = %next.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"),
                "Sleeping for {} seconds...",
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;

            let run = self.run_once(Utc::now()).await;
            tracing::info!(
                failed = run.outcome.is_failed(),
                alerted = run.outcome.should_alert(),
                persisted = run.persisted,
                delivered = run.delivered,
                "Cycle finished"
            );
        }
    }
}

/// First scheduled instant strictly after `now`, in `tz` wall-clock time.
/// A time skipped by a DST jump runs an hour later that day.
pub fn next_run_after(
    now: DateTime<Utc>,
    schedule: &ScheduleConfig,
    tz: Tz,
) -> Result<DateTime<Utc>> {
    let at = NaiveTime::from_hms_opt(schedule.hour, schedule.minute, 0).ok_or_else(|| {
        AlertError::Config(format!(
            "invalid schedule time {:02}:{:02}",
            schedule.hour, schedule.minute
        ))
    })?;

    let mut date = now.with_timezone(&tz).date_naive();
    for _ in 0..3 {
        if let Some(candidate) = resolve_local(tz, date.and_time(at)) {
            if candidate > now {
                return Ok(candidate);
            }
        }
        date = date
            .succ_opt()
            .ok_or_else(|| AlertError::Internal("calendar overflow".to_string()))?;
    }

    Err(AlertError::Internal(format!(
        "no run time found after {}",
        now
    )))
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    let resolved = match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(local + Duration::hours(1))).earliest(),
    };
    resolved.map(|t| t.with_timezone(&Utc))
}
