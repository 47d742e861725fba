//! Dashboard statistics over stored history

use crate::engine::{PersistableRecord, Sentiment};
use crate::error::{AlertError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Look-back windows offered by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPeriod {
    Week,
    Month,
    TwoMonths,
    ThreeMonths,
    Year,
    TwoYears,
}

impl HistoryPeriod {
    pub fn days(&self) -> i64 {
        match self {
            HistoryPeriod::Week => 7,
            HistoryPeriod::Month => 30,
            HistoryPeriod::TwoMonths => 60,
            HistoryPeriod::ThreeMonths => 90,
            HistoryPeriod::Year => 365,
            HistoryPeriod::TwoYears => 730,
        }
    }

    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "7d" => Ok(HistoryPeriod::Week),
            "30d" => Ok(HistoryPeriod::Month),
            "2m" => Ok(HistoryPeriod::TwoMonths),
            "3m" => Ok(HistoryPeriod::ThreeMonths),
            "1y" => Ok(HistoryPeriod::Year),
            "2y" => Ok(HistoryPeriod::TwoYears),
            other => Err(format!(
                "unknown period '{}', expected one of 7d, 30d, 2m, 3m, 1y, 2y",
                other
            )),
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryPeriod::Week => "7d",
            HistoryPeriod::Month => "30d",
            HistoryPeriod::TwoMonths => "2m",
            HistoryPeriod::ThreeMonths => "3m",
            HistoryPeriod::Year => "1y",
            HistoryPeriod::TwoYears => "2y",
        };
        f.write_str(s)
    }
}

/// Current reading, day-over-day change and range extremes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub current: PersistableRecord,
    pub yesterday: PersistableRecord,
    pub change: i64,
    pub band: Sentiment,
    pub high: PersistableRecord,
    pub low: PersistableRecord,
}

/// Summarise newest-first history. Ties for high/low keep the most recent record.
pub fn summarize(history: &[PersistableRecord]) -> Result<IndexStats> {
    let (current, yesterday) = match history {
        [current, yesterday, ..] => (current, yesterday),
        _ => {
            return Err(AlertError::InsufficientData {
                received: history.len(),
            })
        }
    };

    let mut high = current;
    let mut low = current;
    for record in history {
        if record.value > high.value {
            high = record;
        }
        if record.value < low.value {
            low = record;
        }
    }

    Ok(IndexStats {
        current: current.clone(),
        yesterday: yesterday.clone(),
        change: current.value - yesterday.value,
        band: Sentiment::from_value(current.value),
        high: high.clone(),
        low: low.clone(),
    })
}
