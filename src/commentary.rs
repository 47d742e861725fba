//! LLM-generated market commentary
//!
//! Supports multiple LLM providers: DeepSeek, Anthropic, OpenAI, and OpenAI-compatible APIs.
//! The note is attached to today's reading and passed through verbatim.

use crate::engine::{ingest::parse_strict_int, render::format_usd, RawReading};
use crate::error::{AlertError, Result};
use crate::source::SpotPrices;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Produces a short market note for today's reading
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentarySource: Send + Sync {
    async fn commentary(&self, today: &RawReading, prices: &SpotPrices) -> Result<String>;
}

pub struct CommentaryClient {
    http: Client,
    provider: LlmProvider,
}

#[derive(Debug, Clone)]
pub enum LlmProvider {
    DeepSeek {
        api_key: String,
        model: String,
    },
    Anthropic {
        api_key: String,
        model: String,
        base_url: String,
    },
    OpenAI {
        api_key: String,
        model: String,
        base_url: String,
    },
    /// OpenAI-compatible API (Ollama, vLLM, etc.)
    Compatible {
        api_key: Option<String>,
        model: String,
        base_url: String,
    },
}

// ============ Request/Response types ============

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

impl CommentaryClient {
    pub fn new(provider: LlmProvider, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, provider })
    }

    /// Create from config
    pub fn from_config(config: &crate::config::LlmConfig, timeout: Duration) -> Result<Self> {
        let provider = match config.provider.to_lowercase().as_str() {
            "deepseek" => LlmProvider::DeepSeek {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "deepseek-chat".to_string()),
            },
            "anthropic" | "claude" => LlmProvider::Anthropic {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
                base_url: config.base_url.clone().unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            },
            "openai" | "gpt" => LlmProvider::OpenAI {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
                base_url: config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
            },
            "ollama" => LlmProvider::Compatible {
                api_key: None,
                model: config.model.clone().unwrap_or_else(|| "qwen2.5:14b".to_string()),
                base_url: config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
            },
            "compatible" | "custom" => LlmProvider::Compatible {
                api_key: if config.api_key.is_empty() { None } else { Some(config.api_key.clone()) },
                model: config.model.clone().ok_or_else(|| AlertError::Config("model required for compatible provider".into()))?,
                base_url: config.base_url.clone().ok_or_else(|| AlertError::Config("base_url required for compatible provider".into()))?,
            },
            _ => return Err(AlertError::Config(format!("Unknown LLM provider: {}", config.provider))),
        };

        Self::new(provider, timeout)
    }

    pub fn provider_name(&self) -> &str {
        match &self.provider {
            LlmProvider::DeepSeek { .. } => "DeepSeek",
            LlmProvider::Anthropic { .. } => "Claude",
            LlmProvider::OpenAI { .. } => "GPT",
            LlmProvider::Compatible { model, .. } => model,
        }
    }

    fn build_prompt(&self, today: &RawReading, prices: &SpotPrices) -> String {
        let value = parse_strict_int(&today.value)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let classification = today.value_classification.as_deref().unwrap_or("Unknown");

        format!(
            r#"You are a concise crypto market analyst. Write a two-sentence market note for today's subscribers.

Crypto Fear & Greed Index: {} ({})
BTC: {}
ETH: {}

Rules:
1. Plain text only, no Markdown, no emoji
2. Mention what the sentiment level historically suggests
3. Do not give personalised financial advice
"#,
            value,
            classification,
            render_price(prices.btc),
            render_price(prices.eth),
        )
    }

    async fn call_openai_compatible(
        &self,
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        prompt: &str,
    ) -> Result<String> {
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut req = self
            .http
            .post(format!("{}/v1/chat/completions", base_url.trim_end_matches('/')))
            .header("content-type", "application/json");

        if let Some(key) = api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.json(&request).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            tracing::error!(%status, "LLM request failed: {}", truncate(&text, 500));
            return Err(AlertError::Api(format!(
                "LLM API error {}: {}",
                status,
                truncate(&text, 200)
            )));
        }
        tracing::debug!("LLM raw response: {}", truncate(&text, 500));

        let response: OpenAIResponse = serde_json::from_str(&text).map_err(|e| {
            AlertError::Api(format!("JSON parse error: {} - response: {}", e, truncate(&text, 200)))
        })?;

        response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| AlertError::Api("Empty response from LLM".into()))
    }

    async fn call_anthropic(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String> {
        let request = AnthropicRequest {
            model: model.to_string(),
            max_tokens: 300,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response: AnthropicResponse = self
            .http
            .post(format!("{}/v1/messages", base_url.trim_end_matches('/')))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| AlertError::Api("Empty response from Anthropic".into()))
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        match &self.provider {
            LlmProvider::DeepSeek { api_key, model } => {
                self.call_openai_compatible("https://api.deepseek.com", Some(api_key), model, prompt)
                    .await
            }
            LlmProvider::Anthropic { api_key, model, base_url } => {
                self.call_anthropic(base_url, api_key, model, prompt).await
            }
            LlmProvider::OpenAI { api_key, model, base_url } => {
                self.call_openai_compatible(base_url, Some(api_key), model, prompt)
                    .await
            }
            LlmProvider::Compatible { api_key, model, base_url } => {
                self.call_openai_compatible(base_url, api_key.as_deref(), model, prompt)
                    .await
            }
        }
    }
}

#[async_trait]
impl CommentarySource for CommentaryClient {
    async fn commentary(&self, today: &RawReading, prices: &SpotPrices) -> Result<String> {
        let prompt = self.build_prompt(today, prices);
        let response = self.call_llm(&prompt).await?;
        Ok(clean_response(&response))
    }
}

/// Trim whitespace and a single pair of wrapping quotes
fn clean_response(response: &str) -> String {
    let trimmed = response.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn render_price(price: Option<Decimal>) -> String {
    price
        .map(|p| format!("${}", format_usd(p)))
        .unwrap_or_else(|| "n/a".to_string())
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
