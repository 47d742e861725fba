//! Threshold evaluation and template selection

use crate::config::EngineConfig;
use serde::Serialize;

/// Outcome of comparing today against yesterday and the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDecision {
    /// today - yesterday; negative means the index fell
    pub change: i64,
    pub is_extreme_fear: bool,
    pub is_extreme_greed: bool,
    pub is_significant_change: bool,
    pub should_alert: bool,
}

/// Which message template an alert uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ExtremeFear,
    ExtremeGreed,
    SignificantChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl AlertDecision {
    pub fn evaluate(today: i64, yesterday: i64, config: &EngineConfig) -> Self {
        let change = today.saturating_sub(yesterday);

        let is_extreme_fear = today <= config.extreme_fear_threshold;
        let is_extreme_greed = today >= config.extreme_greed_threshold;
        let is_significant_change =
            change.unsigned_abs() >= config.significant_change_threshold.unsigned_abs();

        Self {
            change,
            is_extreme_fear,
            is_extreme_greed,
            is_significant_change,
            should_alert: is_extreme_fear || is_extreme_greed || is_significant_change,
        }
    }

    /// Extreme fear wins over extreme greed, which wins over a significant change.
    pub fn kind(&self) -> Option<AlertKind> {
        if self.is_extreme_fear {
            Some(AlertKind::ExtremeFear)
        } else if self.is_extreme_greed {
            Some(AlertKind::ExtremeGreed)
        } else if self.is_significant_change {
            Some(AlertKind::SignificantChange)
        } else {
            None
        }
    }

    pub fn direction(&self) -> Direction {
        match self.change {
            c if c > 0 => Direction::Up,
            c if c < 0 => Direction::Down,
            _ => Direction::Flat,
        }
    }
}

impl AlertKind {
    pub fn header(&self) -> &'static str {
        match self {
            AlertKind::ExtremeFear => "🔥 *Extreme Fear = Buying Opportunity!*",
            AlertKind::ExtremeGreed => "⚠️ *Extreme Greed = Time to Take Profit!*",
            AlertKind::SignificantChange => "⚡ *Sharp Move Detected*",
        }
    }

    pub fn action_lines(&self) -> &'static [&'static str] {
        match self {
            AlertKind::ExtremeFear => &[
                "💡 *\"Buy the fear, sell the euphoria\"*",
                "⚔️ Get ready: buy while everyone else is selling!",
            ],
            AlertKind::ExtremeGreed => &[
                "💡 *\"Sell into euphoria\"*",
                "🛡️ Lock in gains and raise your cash position!",
            ],
            AlertKind::SignificantChange => &["💡 Keep a close eye on market volatility"],
        }
    }
}

impl Direction {
    pub fn icon(&self) -> &'static str {
        match self {
            Direction::Up => "📈",
            Direction::Down => "📉",
            Direction::Flat => "➡️",
        }
    }
}
