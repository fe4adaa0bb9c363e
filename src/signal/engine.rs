//! Indicator and classifier vote combination

use super::classifier::{features, Classifier, ClassifierError, Prediction};
use super::types::{Direction, Signal};
use crate::config::{IndicatorConfig, SignalConfig, SignalPolicy};
use crate::feed::Bar;
use crate::indicators::{closes, macd, rsi, Macd};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Indicator votes for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Votes {
    pub rsi: Direction,
    pub macd: Direction,
    /// `None` when the classifier could not answer
    pub model: Option<Prediction>,
}

impl Votes {
    fn model_direction(&self) -> Direction {
        match self.model {
            Some(Prediction::Buy) => Direction::Buy,
            Some(Prediction::Sell) => Direction::Sell,
            _ => Direction::None,
        }
    }

    fn indicator_voted(&self, direction: Direction) -> bool {
        self.rsi == direction || self.macd == direction
    }

    /// Direction under `policy`
    pub fn decide(&self, policy: SignalPolicy) -> Direction {
        let model = self.model_direction();
        match policy {
            SignalPolicy::Strict => {
                if model != Direction::None && self.indicator_voted(model) {
                    model
                } else {
                    Direction::None
                }
            }
            SignalPolicy::Permissive => {
                let buy = self.indicator_voted(Direction::Buy);
                let sell = self.indicator_voted(Direction::Sell);
                match (buy, sell) {
                    (true, false) => Direction::Buy,
                    (false, true) => Direction::Sell,
                    (true, true) => model,
                    (false, false) => Direction::None,
                }
            }
        }
    }

    /// Share of answering voters that agree with `direction`
    pub fn confidence(&self, direction: Direction) -> Decimal {
        if direction == Direction::None {
            return Decimal::ZERO;
        }
        let voters = if self.model.is_some() { 3 } else { 2 };
        let agree = [self.rsi, self.macd, self.model_direction()]
            .iter()
            .filter(|&&d| d == direction)
            .count();
        Decimal::from(agree) / Decimal::from(voters)
    }
}

/// Turns price history into a [`Signal`]
pub struct SignalEngine {
    indicators: IndicatorConfig,
    policy: SignalPolicy,
    min_bars: usize,
    classifier: Option<Arc<dyn Classifier>>,
    degraded_logged: AtomicBool,
}

impl SignalEngine {
    pub fn new(
        indicators: IndicatorConfig,
        signal: &SignalConfig,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> Self {
        Self {
            indicators,
            policy: signal.policy,
            min_bars: signal.min_bars,
            classifier,
            degraded_logged: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> SignalPolicy {
        self.policy
    }

    fn log_degraded_once(&self, reason: &str) {
        if !self.degraded_logged.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                policy = ?self.policy,
                reason,
                "Classifier unavailable, signals degraded"
            );
        }
    }

    fn consult(&self, bars: &[Bar], rsi: f64, macd: &Macd) -> Option<Prediction> {
        let Some(classifier) = &self.classifier else {
            self.log_degraded_once("no classifier configured");
            return None;
        };
        let features = features(bars, rsi, macd, self.indicators.feature_window)?;

        match classifier.predict(&features) {
            Ok(prediction) => Some(prediction),
            Err(ClassifierError::Unavailable(reason)) => {
                self.log_degraded_once(&reason);
                None
            }
            Err(e) => {
                self.log_degraded_once(&e.to_string());
                None
            }
        }
    }

    /// Indicator and model votes for the latest bar
    pub fn votes(&self, bars: &[Bar]) -> Votes {
        let cfg = &self.indicators;
        let closes = closes(bars);
        let rsi = rsi(&closes, cfg.rsi_period);
        let macd = macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);

        let rsi_vote = if rsi < cfg.rsi_oversold {
            Direction::Buy
        } else if rsi > cfg.rsi_overbought {
            Direction::Sell
        } else {
            Direction::None
        };
        let macd_vote = if macd.is_bullish() {
            Direction::Buy
        } else if macd.is_bearish() {
            Direction::Sell
        } else {
            Direction::None
        };

        Votes {
            rsi: rsi_vote,
            macd: macd_vote,
            model: self.consult(bars, rsi, &macd),
        }
    }

    /// Decide a direction for the latest bar in `bars` (oldest first)
    pub fn generate_signal(&self, bars: &[Bar]) -> Signal {
        if bars.len() < self.min_bars {
            return Signal::none();
        }

        let votes = self.votes(bars);
        let direction = votes.decide(self.policy);
        let signal = Signal::new(direction, votes.confidence(direction));

        tracing::debug!(
            rsi = %votes.rsi,
            macd = %votes.macd,
            model = ?votes.model,
            direction = %signal.direction,
            confidence = %signal.confidence,
            "Signal evaluated"
        );
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Features;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    struct Fixed(Option<Prediction>);

    impl Classifier for Fixed {
        fn predict(&self, _: &Features) -> Result<Prediction, ClassifierError> {
            self.0
                .ok_or_else(|| ClassifierError::Unavailable("offline".to_string()))
        }
    }

    fn trend(n: usize, step: Decimal) -> Vec<Bar> {
        let start = Utc::now();
        (0..n)
            .map(|i| {
                let close = dec!(100) + step * Decimal::from(i);
                Bar {
                    timestamp: start + Duration::hours(i as i64),
                    open: close - step / dec!(2),
                    high: close + dec!(0.5),
                    low: close - dec!(0.5),
                    close,
                    volume: dec!(1000),
                }
            })
            .collect()
    }

    fn uptrend() -> Vec<Bar> {
        trend(50, dec!(0.5))
    }

    fn downtrend() -> Vec<Bar> {
        trend(50, dec!(-0.5))
    }

    /// Thresholds that keep RSI from ever voting
    fn macd_only() -> IndicatorConfig {
        IndicatorConfig {
            rsi_overbought: 101.0,
            rsi_oversold: -1.0,
            ..IndicatorConfig::default()
        }
    }

    fn engine(
        indicators: IndicatorConfig,
        policy: SignalPolicy,
        model: Option<Option<Prediction>>,
    ) -> SignalEngine {
        let signal = SignalConfig {
            policy,
            ..SignalConfig::default()
        };
        let classifier = model.map(|p| Arc::new(Fixed(p)) as Arc<dyn Classifier>);
        SignalEngine::new(indicators, &signal, classifier)
    }

    #[test]
    fn test_too_few_bars_is_none() {
        let e = engine(macd_only(), SignalPolicy::Permissive, None);
        assert_eq!(e.generate_signal(&uptrend()[..29]), Signal::none());
    }

    #[test]
    fn test_strict_requires_model_agreement() {
        let e = engine(macd_only(), SignalPolicy::Strict, Some(Some(Prediction::Buy)));
        let s = e.generate_signal(&uptrend());
        assert_eq!(s.direction, Direction::Buy);
        assert_eq!(s.confidence, Decimal::from(2) / Decimal::from(3));

        let e = engine(macd_only(), SignalPolicy::Strict, Some(Some(Prediction::Sell)));
        assert_eq!(e.generate_signal(&uptrend()), Signal::none());

        let e = engine(macd_only(), SignalPolicy::Strict, Some(Some(Prediction::Skip)));
        assert_eq!(e.generate_signal(&uptrend()), Signal::none());
    }

    #[test]
    fn test_strict_without_classifier_is_none_and_logs_once() {
        let e = engine(macd_only(), SignalPolicy::Strict, Some(None));
        assert_eq!(e.generate_signal(&uptrend()), Signal::none());
        assert!(e.degraded_logged.load(Ordering::Relaxed));
        assert_eq!(e.generate_signal(&uptrend()), Signal::none());

        let e = engine(macd_only(), SignalPolicy::Strict, None);
        assert_eq!(e.generate_signal(&uptrend()), Signal::none());
    }

    #[test]
    fn test_permissive_falls_back_to_indicators() {
        let e = engine(macd_only(), SignalPolicy::Permissive, Some(None));
        let s = e.generate_signal(&uptrend());
        assert_eq!(s.direction, Direction::Buy);
        assert_eq!(s.confidence, dec!(0.5));
    }

    #[test]
    fn test_permissive_model_breaks_conflict() {
        // falling prices: RSI oversold votes BUY, MACD votes SELL
        let e = engine(
            IndicatorConfig::default(),
            SignalPolicy::Permissive,
            Some(Some(Prediction::Sell)),
        );
        let votes = e.votes(&downtrend());
        assert_eq!(votes.rsi, Direction::Buy);
        assert_eq!(votes.macd, Direction::Sell);

        let s = e.generate_signal(&downtrend());
        assert_eq!(s.direction, Direction::Sell);
        assert_eq!(s.confidence, Decimal::from(2) / Decimal::from(3));

        let e = engine(IndicatorConfig::default(), SignalPolicy::Permissive, None);
        assert_eq!(e.generate_signal(&downtrend()), Signal::none());
    }

    #[test]
    fn test_decide_table() {
        let votes = Votes {
            rsi: Direction::None,
            macd: Direction::None,
            model: Some(Prediction::Buy),
        };
        // the model alone never trades
        assert_eq!(votes.decide(SignalPolicy::Strict), Direction::None);
        assert_eq!(votes.decide(SignalPolicy::Permissive), Direction::None);

        let votes = Votes {
            rsi: Direction::Sell,
            macd: Direction::Sell,
            model: Some(Prediction::Sell),
        };
        assert_eq!(votes.decide(SignalPolicy::Strict), Direction::Sell);
        assert_eq!(votes.confidence(Direction::Sell), dec!(1));
    }

    #[test]
    fn test_generate_signal_deterministic() {
        let e = engine(
            IndicatorConfig::default(),
            SignalPolicy::Strict,
            Some(Some(Prediction::Buy)),
        );
        let bars = downtrend();
        assert_eq!(e.generate_signal(&bars), e.generate_signal(&bars));
    }
}
