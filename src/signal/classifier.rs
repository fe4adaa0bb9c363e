//! Classifier seam and a bundled logistic model

use crate::config::ClassifierConfig;
use crate::feed::Bar;
use crate::indicators::Macd;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Number of model inputs
pub const FEATURE_COUNT: usize = 7;

/// Model input vector, see [`features`] for the layout
pub type Features = [f64; FEATURE_COUNT];

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    Buy,
    Sell,
    Skip,
}

/// Classifier failures
#[derive(Debug, Error, PartialEq)]
pub enum ClassifierError {
    /// The model cannot answer right now
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
    /// Coefficients do not match the feature layout
    #[error("Expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },
}

/// Direction model consulted by the signal engine
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &Features) -> Result<Prediction, ClassifierError>;
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Build the feature vector from the latest bar and recent window.
///
/// Layout: close - open, high - low, volume, mean range over the last
/// `window` bars, RSI, MACD histogram, high - low.
pub fn features(bars: &[Bar], rsi: f64, macd: &Macd, window: usize) -> Option<Features> {
    let last = bars.last()?;
    let recent = &bars[bars.len().saturating_sub(window.max(1))..];
    let mean_range = recent.iter().map(|b| to_f64(b.range())).sum::<f64>() / recent.len() as f64;
    let range = to_f64(last.range());

    Some([
        to_f64(last.close - last.open),
        range,
        to_f64(last.volume),
        mean_range,
        rsi,
        macd.histogram,
        range,
    ])
}

/// Logistic regression over [`Features`]
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weights: Features,
    intercept: f64,
    skip_band: f64,
}

impl LinearClassifier {
    pub fn new(weights: Features, intercept: f64, skip_band: f64) -> Self {
        Self {
            weights,
            intercept,
            skip_band: skip_band.abs(),
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let weights: Features =
            config
                .weights
                .as_slice()
                .try_into()
                .map_err(|_| ClassifierError::WeightCount {
                    expected: FEATURE_COUNT,
                    actual: config.weights.len(),
                })?;
        Ok(Self::new(weights, config.intercept, config.skip_band))
    }

    /// Probability of an up move
    pub fn probability(&self, features: &Features) -> f64 {
        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, features: &Features) -> Result<Prediction, ClassifierError> {
        if features.iter().any(|x| !x.is_finite()) {
            return Err(ClassifierError::Unavailable("non-finite feature".to_string()));
        }

        let p = self.probability(features);
        if (p - 0.5).abs() <= self.skip_band {
            Ok(Prediction::Skip)
        } else if p > 0.5 {
            Ok(Prediction::Buy)
        } else {
            Ok(Prediction::Sell)
        }
    }
}
