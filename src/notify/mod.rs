//! Telegram notification module
//!
//! Delivers rendered alert messages and cycle-failure notices.


use crate::config::TelegramConfig;
use crate::error::{AlertError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Destination for rendered alert messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver a Markdown message. Empty messages are skipped.
    async fn deliver(&self, message: &str) -> Result<()>;
}

/// Telegram notifier
#[derive(Clone)]
pub struct Notifier {
    http: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_base: TELEGRAM_API.to_string(),
            bot_token,
            chat_id,
        })
    }

    pub fn from_config(config: &TelegramConfig, timeout: Duration) -> Result<Self> {
        Self::new(config.bot_token.clone(), config.chat_id.clone(), timeout)
    }

    /// Point at a different Bot API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a message in legacy Markdown mode
    pub async fn send_markdown(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let msg = TelegramMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self.http.post(&url).json(&msg).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Telegram send failed: {}", error_text);
            return Err(AlertError::Notify(format!(
                "Telegram returned {}: {}",
                status,
                truncate(&error_text, 200)
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AlertSink for Notifier {
    async fn deliver(&self, message: &str) -> Result<()> {
        if message.is_empty() {
            return Ok(());
        }
        self.send_markdown(message).await
    }
}

/// Operator notice for a cycle that could not complete
pub fn failure_message(reason: &str) -> String {
    format!(
        "⚠️ *Fear & Greed alert cycle failed*\n\n{}",
        truncate(reason, 200)
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
