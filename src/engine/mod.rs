//! Fear & Greed ingestion and alert decision engine
//!
//! Single pass per invocation: ingest -> decide -> render -> assemble.
//! The engine holds no state between runs and performs no I/O.

pub mod decision;
pub mod ingest;
pub mod render;
pub mod sentiment;
pub mod types;

#[cfg(test)]
mod tests;

pub use decision::{AlertDecision, AlertKind, Direction};
pub use ingest::{ingest, Ingested};
pub use sentiment::Sentiment;
pub use types::{
    FieldWarning, IndexReading, MarketContext, PersistableRecord, RawBatch, RawMarketContext,
    RawReading, WarningKind,
};

use crate::config::EngineConfig;
use crate::error::{AlertError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Diagnostic view of one cycle, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub today_value: i64,
    pub yesterday_value: i64,
    #[serde(flatten)]
    pub decision: AlertDecision,
    pub kind: Option<AlertKind>,
}

/// Everything a successful cycle hands to the sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub record: PersistableRecord,
    pub should_alert: bool,
    /// Empty when no alert is due
    pub message: String,
    pub analysis: Analysis,
    pub warnings: Vec<FieldWarning>,
}

/// Placeholder emitted when a cycle cannot complete
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleFailure {
    pub failed: bool,
    pub reason: String,
    pub should_alert: bool,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

impl CycleFailure {
    pub fn new(reason: impl Into<String>, failed_at: DateTime<Utc>) -> Self {
        Self {
            failed: true,
            reason: reason.into(),
            should_alert: false,
            message: String::new(),
            failed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Failed(CycleFailure),
}

impl CycleOutcome {
    pub fn should_alert(&self) -> bool {
        match self {
            CycleOutcome::Completed(report) => report.should_alert,
            CycleOutcome::Failed(_) => false,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CycleOutcome::Completed(report) => &report.message,
            CycleOutcome::Failed(_) => "",
        }
    }

    /// Record to persist; absent for failed cycles
    pub fn record(&self) -> Option<&PersistableRecord> {
        match self {
            CycleOutcome::Completed(report) => Some(&report.record),
            CycleOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_))
    }
}

/// Stateless transform from a raw batch to a cycle report
#[derive(Debug, Clone, Default)]
pub struct AlertEngine {
    config: EngineConfig,
}

impl AlertEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the pipeline, propagating ingestion failures
    pub fn process(&self, batch: &RawBatch, generated_at: DateTime<Utc>) -> Result<CycleReport> {
        let Ingested {
            today,
            yesterday,
            context,
            warnings,
        } = ingest(batch, &self.config)?;

        let decision = AlertDecision::evaluate(today.value, yesterday.value, &self.config);
        let message = render::render_message(
            &decision,
            &today,
            &yesterday,
            &context,
            self.config.timezone,
            generated_at,
        );

        let record = PersistableRecord {
            value: today.value,
            timestamp_iso: today.timestamp_iso(),
            classification: today.classification,
            btc_price: context.btc_price,
            eth_price: context.eth_price,
            commentary: context.commentary,
        };

        Ok(CycleReport {
            record,
            should_alert: decision.should_alert,
            message,
            analysis: Analysis {
                today_value: today.value,
                yesterday_value: yesterday.value,
                decision,
                kind: decision.kind(),
            },
            warnings,
        })
    }

    /// Boundary for typed input: never fails, reports instead
    pub fn run_batch(&self, batch: &RawBatch, generated_at: DateTime<Utc>) -> CycleOutcome {
        self.finish(self.process(batch, generated_at), generated_at)
    }

    /// Boundary for untrusted JSON (including `null`): never fails, reports instead
    pub fn run(&self, input: &serde_json::Value, generated_at: DateTime<Utc>) -> CycleOutcome {
        let result = serde_json::from_value::<RawBatch>(input.clone())
            .map_err(|e| AlertError::InvalidInput(e.to_string()))
            .and_then(|batch| self.process(&batch, generated_at));

        self.finish(result, generated_at)
    }

    fn finish(&self, result: Result<CycleReport>, at: DateTime<Utc>) -> CycleOutcome {
        match result {
            Ok(report) => {
                let a = &report.analysis;
                tracing::info!(
                    today = a.today_value,
                    yesterday = a.yesterday_value,
                    change = a.decision.change,
                    extreme_fear = a.decision.is_extreme_fear,
                    extreme_greed = a.decision.is_extreme_greed,
                    significant_change = a.decision.is_significant_change,
                    should_alert = report.should_alert,
                    "Transform complete"
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                tracing::error!("Transform failed: {}", e);
                CycleOutcome::Failed(CycleFailure::new(e.to_string(), at))
            }
        }
    }
}
