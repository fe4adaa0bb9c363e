//! Market data types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV sample for a fixed interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Interval open time
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// A bar where open, high, low and close are all `price`
    pub fn flat(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
        }
    }

    /// High minus low
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Static metadata about a tradeable instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    /// Instrument identifier (FIGI, ticker, symbol...)
    pub id: String,
    /// Units per lot
    pub lot: Decimal,
    /// Smallest tradeable quantity in lots
    pub min_lot: Decimal,
    /// Commission category
    pub category: String,
}

impl InstrumentMeta {
    /// Metadata with a lot size and minimum lot of one
    pub fn new(id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lot: Decimal::ONE,
            min_lot: Decimal::ONE,
            category: category.into(),
        }
    }
}

/// Errors reading bar data
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid {field} on line {line}: {value:?}")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
}
