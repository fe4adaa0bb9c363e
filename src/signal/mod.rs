//! Signal generation module
//!
//! Combines RSI and MACD votes with a classifier prediction into one
//! direction and confidence per instrument

mod classifier;
mod engine;
mod types;

pub use classifier::{
    features, Classifier, ClassifierError, Features, LinearClassifier, Prediction, FEATURE_COUNT,
};
pub use engine::{SignalEngine, Votes};
pub use types::{Direction, ParseDirectionError, Signal};
