//! Average True Range
//!
//! TR[i] = max(high - low, |high - prev_close|, |low - prev_close|), i >= 1.
//! ATR is the simple mean of the last `period` true ranges.

use crate::feed::Bar;
use rust_decimal::Decimal;

/// True range series, one value per bar after the first
pub fn true_range(bars: &[Bar]) -> Vec<Decimal> {
    bars.windows(2)
        .map(|w| {
            let (prev, bar) = (&w[0], &w[1]);
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs())
        })
        .collect()
}

/// ATR over the last `period` true ranges.
///
/// Returns zero when fewer than `period + 1` bars are available; callers
/// treat a zero ATR as "volatility unknown".
pub fn atr(bars: &[Bar], period: usize) -> Decimal {
    if period == 0 || bars.len() < period + 1 {
        return Decimal::ZERO;
    }

    let tr = true_range(bars);
    let sum: Decimal = tr[tr.len() - period..].iter().sum();
    sum / Decimal::from(period)
}
