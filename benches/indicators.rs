//! Benchmarks for indicator and signal evaluation

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use trade_engine::config::{IndicatorConfig, SignalConfig, SignalPolicy};
use trade_engine::feed::Bar;
use trade_engine::indicators::{atr, closes, macd, rsi};
use trade_engine::signal::{LinearClassifier, SignalEngine};

/// A month of hourly bars oscillating around 100
fn history() -> Vec<Bar> {
    let start = Utc::now() - Duration::hours(720);
    (0..720)
        .map(|i| {
            let close = dec!(100) + Decimal::from((i % 24) as i64 - 12) / dec!(4);
            Bar {
                timestamp: start + Duration::hours(i),
                open: close - dec!(0.1),
                high: close + dec!(0.5),
                low: close - dec!(0.5),
                close,
                volume: dec!(1000),
            }
        })
        .collect()
}

fn benchmark_indicators(c: &mut Criterion) {
    let bars = history();
    let prices = closes(&bars);

    c.bench_function("rsi_14", |b| b.iter(|| rsi(black_box(&prices), 14)));
    c.bench_function("macd_12_26_9", |b| {
        b.iter(|| macd(black_box(&prices), 12, 26, 9))
    });
    c.bench_function("atr_14", |b| b.iter(|| atr(black_box(&bars), 14)));
}

fn benchmark_signal(c: &mut Criterion) {
    let bars = history();
    let classifier = LinearClassifier::new([0.8, -0.1, 0.0, -0.2, -0.04, 1.5, -0.1], 2.0, 0.05);
    let engine = SignalEngine::new(
        IndicatorConfig::default(),
        &SignalConfig {
            policy: SignalPolicy::Permissive,
            ..SignalConfig::default()
        },
        Some(Arc::new(classifier)),
    );

    c.bench_function("generate_signal_720_bars", |b| {
        b.iter(|| engine.generate_signal(black_box(&bars)))
    });
}

criterion_group!(benches, benchmark_indicators, benchmark_signal);
criterion_main!(benches);
