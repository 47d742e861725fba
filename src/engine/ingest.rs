//! Batch ingestion and best-effort field coercion

use super::types::{
    FieldWarning, IndexReading, MarketContext, RawBatch, RawMarketContext, RawReading, WarningKind,
};
use crate::config::EngineConfig;
use crate::error::{AlertError, Result};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

const MIN_READINGS: usize = 2;
pub const INDEX_MIN: i64 = 0;
pub const INDEX_MAX: i64 = 100;
const UNKNOWN_CLASSIFICATION: &str = "Unknown";

/// Validated today/yesterday pair plus side data
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub today: IndexReading,
    pub yesterday: IndexReading,
    pub context: MarketContext,
    pub warnings: Vec<FieldWarning>,
}

/// Validate a newest-first batch; only the first two readings are used.
pub fn ingest(batch: &RawBatch, config: &EngineConfig) -> Result<Ingested> {
    if batch.readings.len() < MIN_READINGS {
        return Err(AlertError::InsufficientData {
            received: batch.readings.len(),
        });
    }

    let mut warnings = Vec::new();
    let today = coerce_reading(&batch.readings[0], 0, config, &mut warnings);
    let yesterday = coerce_reading(&batch.readings[1], 1, config, &mut warnings);
    let context = batch
        .market_context
        .as_ref()
        .map(|raw| normalize_context(raw, &mut warnings))
        .unwrap_or_default();

    for warning in &warnings {
        tracing::warn!("Defaulted field during ingestion: {}", warning);
    }

    Ok(Ingested {
        today,
        yesterday,
        context,
        warnings,
    })
}

pub(crate) fn coerce_reading(
    raw: &RawReading,
    position: usize,
    config: &EngineConfig,
    warnings: &mut Vec<FieldWarning>,
) -> IndexReading {
    let fallback = config.fallback_integer_default;

    let value = match parse_strict_int(&raw.value) {
        Some(v) if (INDEX_MIN..=INDEX_MAX).contains(&v) => v,
        Some(v) => {
            let clamped = v.clamp(INDEX_MIN, INDEX_MAX);
            warnings.push(warning(
                position,
                "value",
                &raw.value,
                WarningKind::OutOfRange,
                Some(clamped),
            ));
            clamped
        }
        None => {
            let substituted = fallback.clamp(INDEX_MIN, INDEX_MAX);
            warnings.push(warning(
                position,
                "value",
                &raw.value,
                WarningKind::Unparseable,
                Some(substituted),
            ));
            substituted
        }
    };

    let timestamp = match parse_strict_int(&raw.timestamp).and_then(epoch_to_utc) {
        Some(ts) => ts,
        None => {
            warnings.push(warning(
                position,
                "timestamp",
                &raw.timestamp,
                WarningKind::Unparseable,
                Some(fallback),
            ));
            epoch_to_utc(fallback).unwrap_or_default()
        }
    };

    let classification = raw
        .value_classification
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CLASSIFICATION)
        .to_string();

    IndexReading {
        value,
        classification,
        timestamp,
    }
}

/// Integers, integral floats, and trimmed decimal integer strings.
/// Anything else (including "45abc" or "12.5") is rejected.
pub fn parse_strict_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Epoch seconds to a UTC instant; `None` outside chrono's range.
pub fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Decimal from a JSON number or a trimmed numeric string
pub fn parse_price(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Keep positive prices and non-blank commentary; anything malformed is dropped with a warning.
fn normalize_context(raw: &RawMarketContext, warnings: &mut Vec<FieldWarning>) -> MarketContext {
    MarketContext {
        btc_price: coerce_price(&raw.btc_price, "btcPrice", warnings),
        eth_price: coerce_price(&raw.eth_price, "ethPrice", warnings),
        commentary: coerce_commentary(&raw.commentary, warnings),
    }
}

fn coerce_price(
    raw: &Value,
    field: &'static str,
    warnings: &mut Vec<FieldWarning>,
) -> Option<Decimal> {
    if raw.is_null() {
        return None;
    }

    match parse_price(raw) {
        Some(price) if price > Decimal::ZERO => Some(price),
        Some(_) => {
            warnings.push(warning(0, field, raw, WarningKind::OutOfRange, None));
            None
        }
        None => {
            warnings.push(warning(0, field, raw, WarningKind::Unparseable, None));
            None
        }
    }
}

fn coerce_commentary(raw: &Value, warnings: &mut Vec<FieldWarning>) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => {
            warnings.push(warning(0, "commentary", other, WarningKind::Unparseable, None));
            None
        }
    }
}

fn warning(
    position: usize,
    field: &'static str,
    raw: &Value,
    kind: WarningKind,
    substituted: Option<i64>,
) -> FieldWarning {
    FieldWarning {
        reading: position,
        field,
        raw: raw.to_string(),
        kind,
        substituted,
    }
}
