//! Technical indicators
//!
//! Pure numeric functions over a chronological price sequence (oldest first).
//! The oscillators work in `f64`; ATR stays in `Decimal` because it feeds
//! stop, target and sizing arithmetic directly.

mod atr;
mod macd;
mod rsi;

pub use atr::{atr, true_range};
pub use macd::{ema_series, macd, Macd};
pub use rsi::{rsi, RSI_NEUTRAL};

use crate::feed::Bar;
use rust_decimal::prelude::ToPrimitive;

/// Extract closing prices as `f64` for the oscillators
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .map(|b| b.close.to_f64().unwrap_or(0.0))
        .collect()
}
