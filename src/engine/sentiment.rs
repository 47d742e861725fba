//! Sentiment classification bands

use serde::Serialize;

/// Known index classifications; anything else maps to `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
    Other,
}

impl Sentiment {
    /// Match a source label, ignoring case and surrounding whitespace
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "extreme fear" => Sentiment::ExtremeFear,
            "fear" => Sentiment::Fear,
            "neutral" => Sentiment::Neutral,
            "greed" => Sentiment::Greed,
            "extreme greed" => Sentiment::ExtremeGreed,
            _ => Sentiment::Other,
        }
    }

    /// Band an index value the way the dashboard colours it
    pub fn from_value(value: i64) -> Self {
        match value {
            v if v <= 20 => Sentiment::ExtremeFear,
            v if v <= 40 => Sentiment::Fear,
            v if v <= 60 => Sentiment::Neutral,
            v if v <= 80 => Sentiment::Greed,
            _ => Sentiment::ExtremeGreed,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Sentiment::ExtremeFear => "😱",
            Sentiment::Fear => "😨",
            Sentiment::Neutral => "😐",
            Sentiment::Greed => "🤑",
            Sentiment::ExtremeGreed => "🚀",
            Sentiment::Other => "📊",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::ExtremeFear => "Extreme Fear",
            Sentiment::Fear => "Fear",
            Sentiment::Neutral => "Neutral",
            Sentiment::Greed => "Greed",
            Sentiment::ExtremeGreed => "Extreme Greed",
            Sentiment::Other => "Unknown",
        }
    }
}
