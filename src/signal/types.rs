//! Signal types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    /// No trade
    None,
}

impl Direction {
    /// The other side; `None` stays `None`
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
            Direction::None => Direction::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::None => "NONE",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised direction string
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid direction: {0:?}")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            "NONE" => Ok(Direction::None),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

/// A trading decision for one instrument at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    /// Share of voters agreeing with `direction`, in [0, 1]
    pub confidence: Decimal,
}

impl Signal {
    pub fn new(direction: Direction, confidence: Decimal) -> Self {
        Self {
            direction,
            confidence: confidence.clamp(Decimal::ZERO, Decimal::ONE),
        }
    }

    /// No trade, zero confidence
    pub fn none() -> Self {
        Self {
            direction: Direction::None,
            confidence: Decimal::ZERO,
        }
    }

    /// True for BUY or SELL
    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::None
    }
}
