//! Input and output shapes of the alert engine

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// One batch as delivered by the index source, newest reading first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBatch {
    /// Alternative.me calls this array `data`
    #[serde(default, alias = "data")]
    pub readings: Vec<RawReading>,
    #[serde(default, deserialize_with = "lenient_context")]
    pub market_context: Option<RawMarketContext>,
}

/// Reading exactly as the source sent it; numbers may arrive as strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub value: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value_classification: Option<String>,
    #[serde(default)]
    pub timestamp: Value,
}

impl RawReading {
    pub fn new(
        value: impl Into<Value>,
        classification: &str,
        timestamp: impl Into<Value>,
    ) -> Self {
        Self {
            value: value.into(),
            value_classification: Some(classification.to_string()),
            timestamp: timestamp.into(),
        }
    }
}

/// Side data as received; every field is coerced on its own during ingestion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarketContext {
    #[serde(default)]
    pub btc_price: Value,
    #[serde(default)]
    pub eth_price: Value,
    #[serde(default)]
    pub commentary: Value,
}

impl From<MarketContext> for RawMarketContext {
    fn from(context: MarketContext) -> Self {
        let price = |p: Option<Decimal>| p.map_or(Value::Null, |d| Value::String(d.to_string()));

        Self {
            btc_price: price(context.btc_price),
            eth_price: price(context.eth_price),
            commentary: context.commentary.map_or(Value::Null, Value::String),
        }
    }
}

/// Non-object contexts are dropped rather than failing the batch
fn lenient_context<'de, D>(deserializer: D) -> Result<Option<RawMarketContext>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value @ Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => {
            tracing::warn!("Ignoring malformed market context: {}", other);
            Ok(None)
        }
    }
}

/// Strings pass through, scalars are stringified, anything else is absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Side data attached to today's reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    #[serde(default)]
    pub btc_price: Option<Decimal>,
    #[serde(default)]
    pub eth_price: Option<Decimal>,
    /// AI-generated note, passed through verbatim
    #[serde(default)]
    pub commentary: Option<String>,
}

impl MarketContext {
    /// Both prices, or nothing
    pub fn prices(&self) -> Option<(Decimal, Decimal)> {
        match (self.btc_price, self.eth_price) {
            (Some(btc), Some(eth)) => Some((btc, eth)),
            _ => None,
        }
    }

    pub fn commentary(&self) -> Option<&str> {
        self.commentary.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Validated index observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReading {
    /// 0..=100
    pub value: i64,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

impl IndexReading {
    /// `YYYY-MM-DDTHH:MM:SS.mmmZ`
    pub fn timestamp_iso(&self) -> String {
        to_iso(self.timestamp)
    }
}

pub(crate) fn to_iso(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Row handed to the persistence sink, one per cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistableRecord {
    pub value: i64,
    pub classification: String,
    pub timestamp_iso: String,
    #[serde(serialize_with = "rust_decimal::serde::float_option::serialize", default)]
    pub btc_price: Option<Decimal>,
    #[serde(serialize_with = "rust_decimal::serde::float_option::serialize", default)]
    pub eth_price: Option<Decimal>,
    pub commentary: Option<String>,
}

impl PersistableRecord {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp_iso)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Field failed parsing; fallback substituted or field dropped
    Unparseable,
    /// Parsed value outside its range; clamped or dropped
    OutOfRange,
}

/// Non-fatal ingestion notice: a field was defaulted, clamped or dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldWarning {
    /// Position in the batch (0 = today)
    pub reading: usize,
    pub field: &'static str,
    pub raw: String,
    pub kind: WarningKind,
    /// Value used instead; `None` when the field was dropped
    pub substituted: Option<i64>,
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            WarningKind::Unparseable => "malformed",
            WarningKind::OutOfRange => "out of range",
        };
        write!(f, "reading[{}].{} {} ({}), ", self.reading, self.field, what, self.raw)?;
        match self.substituted {
            Some(value) => write!(f, "using {}", value),
            None => write!(f, "dropped"),
        }
    }
}
