//! Configuration management

use crate::engine::ingest::{INDEX_MAX, INDEX_MIN};
use crate::error::{AlertError, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
    pub supabase: Option<SupabaseConfig>,
    pub database: Option<DatabaseConfig>,
    pub telegram: Option<TelegramConfig>,
    pub llm: Option<LlmConfig>,
}

/// Thresholds and formatting options for the alert engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Index at or below this value is Extreme Fear
    pub extreme_fear_threshold: i64,
    /// Index at or above this value is Extreme Greed
    pub extreme_greed_threshold: i64,
    /// Absolute day-over-day change that counts as significant
    pub significant_change_threshold: i64,
    /// Zone used for the generation stamp and the daily schedule
    pub timezone: Tz,
    /// Substituted for numeric fields that fail to parse
    pub fallback_integer_default: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Alternative.me API base
    pub fng_url: String,
    /// CoinGecko API base (spot prices)
    pub price_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Fetch BTC/ETH prices alongside the index
    pub fetch_prices: bool,
}

/// Local wall-clock time of the daily run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL (https://<ref>.supabase.co)
    pub url: String,
    /// Anon or service-role key
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Also report failed cycles to the chat
    #[serde(default)]
    pub notify_failures: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (anthropic, openai, deepseek, ollama, compatible)
    pub provider: String,
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// Model name
    pub model: Option<String>,
    /// Base URL for OpenAI-compatible endpoints
    pub base_url: Option<String>,
}

fn default_table() -> String {
    "fng_logs".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extreme_fear_threshold: 20,
            extreme_greed_threshold: 80,
            significant_change_threshold: 15,
            timezone: chrono_tz::Asia::Seoul,
            fallback_integer_default: 0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("extreme_fear_threshold", self.extreme_fear_threshold),
            ("extreme_greed_threshold", self.extreme_greed_threshold),
            ("significant_change_threshold", self.significant_change_threshold),
        ];
        for (name, value) in thresholds {
            if value <= 0 {
                return Err(AlertError::Config(format!(
                    "{} must be a positive integer, got {}",
                    name, value
                )));
            }
        }

        if self.extreme_fear_threshold >= self.extreme_greed_threshold {
            return Err(AlertError::Config(format!(
                "extreme_fear_threshold ({}) must be below extreme_greed_threshold ({})",
                self.extreme_fear_threshold, self.extreme_greed_threshold
            )));
        }

        if !(INDEX_MIN..=INDEX_MAX).contains(&self.fallback_integer_default) {
            return Err(AlertError::Config(format!(
                "fallback_integer_default must be within {}..={}, got {}",
                INDEX_MIN, INDEX_MAX, self.fallback_integer_default
            )));
        }

        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            fng_url: "https://api.alternative.me".to_string(),
            price_url: "https://api.coingecko.com/api/v3".to_string(),
            timeout_secs: 30,
            fetch_prices: true,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        // 09:00 in the engine timezone
        Self { hour: 9, minute: 0 }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 || self.minute > 59 {
            return Err(AlertError::Config(format!(
                "schedule time {:02}:{:02} is not a valid wall-clock time",
                self.hour, self.minute
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from file, layered with `FNG_*` environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::build(Some(path.as_ref()))
    }

    /// Load from default locations, falling back to defaults plus environment
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "config.yaml", "~/.config/fng-alert/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path).into_owned();
            if Path::new(&expanded).exists() {
                return Self::load(&expanded);
            }
        }

        tracing::debug!("No configuration file found, using defaults and environment");
        Self::build(None)
    }

    fn build(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("FNG")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.schedule.validate()
    }
}
