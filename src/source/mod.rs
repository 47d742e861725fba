//! Upstream data sources
//!
//! - Alternative.me: Fear & Greed Index readings
//! - CoinGecko: BTC/ETH spot prices

pub mod alternative;
pub mod coingecko;


pub use alternative::FngClient;
pub use coingecko::PriceClient;

use crate::engine::RawReading;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// USD spot prices; either may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotPrices {
    pub btc: Option<Decimal>,
    pub eth: Option<Decimal>,
}

/// Source of index readings, newest first
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// `limit = 0` requests the full history
    async fn readings(&self, limit: usize) -> Result<Vec<RawReading>>;
}

/// Source of spot prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn spot_prices(&self) -> Result<SpotPrices>;
}
