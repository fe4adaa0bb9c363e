//! Prometheus metrics

use crate::risk::CloseReason;
use crate::signal::Direction;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current equity
    Equity,
    /// Free cash
    Cash,
    /// Open position count
    OpenPositions,
    /// Loss since start of day as a fraction
    DailyLossPct,
    /// 1 while the account trades, 0 once halted
    AccountActive,
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::Equity => "trade_engine_equity",
            GaugeMetric::Cash => "trade_engine_cash",
            GaugeMetric::OpenPositions => "trade_engine_open_positions",
            GaugeMetric::DailyLossPct => "trade_engine_daily_loss_pct",
            GaugeMetric::AccountActive => "trade_engine_account_active",
        }
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Count a generated signal by direction
pub fn record_signal(direction: Direction) {
    metrics::counter!("trade_engine_signals_total", "direction" => direction.as_str()).increment(1);
}

/// Count an order submission and whether it filled
pub fn record_order(filled: bool) {
    let outcome = if filled { "filled" } else { "failed" };
    metrics::counter!("trade_engine_orders_total", "outcome" => outcome).increment(1);
}

/// Count a position close by reason
pub fn record_close(reason: CloseReason) {
    metrics::counter!("trade_engine_position_closes_total", "reason" => reason.as_str())
        .increment(1);
}

/// Count an instrument skipped for a cycle
pub fn record_skip(cause: &'static str) {
    metrics::counter!("trade_engine_instrument_skips_total", "cause" => cause).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_names_are_prefixed() {
        for metric in [
            GaugeMetric::Equity,
            GaugeMetric::Cash,
            GaugeMetric::OpenPositions,
            GaugeMetric::DailyLossPct,
            GaugeMetric::AccountActive,
        ] {
            assert!(metric.name().starts_with("trade_engine_"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_signal(Direction::Buy);
        record_order(false);
        record_close(CloseReason::CriticalStop);
        record_skip("no_bars");
        set_gauge(GaugeMetric::Equity, 1.0);
    }
}
