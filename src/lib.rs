//! Crypto Fear & Greed Index alerts
//!
//! Pulls the daily index, decides whether today's reading is worth an alert,
//! renders a Telegram message and persists the reading.

pub mod backfill;
pub mod commentary;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod notify;
pub mod source;
pub mod storage;
