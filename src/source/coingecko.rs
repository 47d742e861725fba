//! CoinGecko spot price client

use super::{PriceSource, SpotPrices};
use crate::error::{AlertError, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;

/// Client for `GET /simple/price`
#[derive(Clone)]
pub struct PriceClient {
    http: Client,
    base_url: String,
}

/// `{"bitcoin": {"usd": 97000.5}, "ethereum": {"usd": 3400}}`
type SimplePriceResponse = HashMap<String, HashMap<String, Decimal>>;

impl PriceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch(&self) -> Result<SpotPrices> {
        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("ids", "bitcoin,ethereum"), ("vs_currencies", "usd")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AlertError::Api(format!(
                "Price API returned {}",
                response.status()
            )));
        }

        let body: SimplePriceResponse = response.json().await?;
        let usd = |id: &str| body.get(id).and_then(|quotes| quotes.get("usd")).copied();

        Ok(SpotPrices {
            btc: usd("bitcoin"),
            eth: usd("ethereum"),
        })
    }
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn spot_prices(&self) -> Result<SpotPrices> {
        self.fetch().await
    }
}
