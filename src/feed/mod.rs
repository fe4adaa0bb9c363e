//! Market data module
//!
//! Price history and last-price lookups consumed by the account loop

mod csv_feed;
mod types;

pub use csv_feed::CsvFeed;
pub use types::{Bar, FeedError, InstrumentMeta};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Trait for market data sources
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Instruments available for trading
    async fn instruments(&self) -> anyhow::Result<Vec<InstrumentMeta>>;
    /// Ordered, deduplicated bars with `from <= timestamp <= to`
    async fn bars(
        &self,
        instrument: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Bar>>;
    /// Most recent traded price
    async fn last_price(&self, instrument: &str) -> anyhow::Result<Decimal>;
}
