//! MACD (Moving Average Convergence Divergence)
//!
//! line = EMA(fast) - EMA(slow), signal = EMA(signal_period) of line,
//! histogram = line - signal. EMAs are recursive and seeded with the first
//! value, alpha = 2 / (span + 1).

use serde::{Deserialize, Serialize};

/// MACD values at the most recent point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl Macd {
    /// MACD line above its signal line
    pub fn is_bullish(&self) -> bool {
        self.line > self.signal
    }

    /// MACD line below its signal line
    pub fn is_bearish(&self) -> bool {
        self.line < self.signal
    }
}

/// Exponential moving average over the whole series
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return out;
    };

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut ema = first;
    out.push(ema);
    for &value in &values[1..] {
        ema = alpha * value + (1.0 - alpha) * ema;
        out.push(ema);
    }
    out
}

/// Compute MACD at the last point of `closes`.
///
/// Returns all zeros when fewer than `slow` prices are available.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    if closes.is_empty() || closes.len() < slow {
        return Macd::default();
    }

    let ema_fast = ema_series(closes, fast);
    let ema_slow = ema_series(closes, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&line, signal);

    let last_line = line[line.len() - 1];
    let last_signal = signal_line[signal_line.len() - 1];

    Macd {
        line: last_line,
        signal: last_signal,
        histogram: last_line - last_signal,
    }
}
