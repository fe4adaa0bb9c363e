//! Relative Strength Index
//!
//! Simple-average variant: mean gain over mean loss across the last `period`
//! price changes, mapped onto [0, 100].

/// Value returned when there is not enough history
pub const RSI_NEUTRAL: f64 = 50.0;

/// Compute RSI over the most recent `period` deltas of `closes`.
///
/// Returns [`RSI_NEUTRAL`] with fewer than `period + 1` prices and 100 when
/// the window contains no losses.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return RSI_NEUTRAL;
    }

    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
