//! Risk management types

use crate::signal::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Position book errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RiskError {
    /// A position for the instrument is already open
    #[error("Position already open for {0}")]
    PositionExists(String),
    /// Fill has no quantity
    #[error("Zero quantity fill for {0}")]
    ZeroQuantity(String),
}

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Side opened by a BUY or SELL signal
    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Buy => Some(Side::Long),
            Direction::Sell => Some(Side::Short),
            Direction::None => None,
        }
    }

    /// Order direction that opens or adds to this side
    pub fn entry_direction(self) -> Direction {
        match self {
            Side::Long => Direction::Buy,
            Side::Short => Direction::Sell,
        }
    }

    /// Order direction that reduces or closes this side
    pub fn exit_direction(self) -> Direction {
        self.entry_direction().opposite()
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// Why a position (or part of one) left the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// Held past the maximum duration without enough profit
    TimeoutLowProfit,
    /// Soft daily loss limit reached
    DailyLossLimit,
    /// Critical loss threshold reached; the account is halted
    CriticalStop,
    StopLoss,
    TakeProfit,
    /// Profit-taking exit (partial or remainder)
    PartialTakeProfit,
    /// Opposite signal flipped the position
    Reversal,
    /// Closed to free cash for another trade
    Rebalance,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::TimeoutLowProfit => "TIMEOUT_LOW_PROFIT",
            CloseReason::DailyLossLimit => "DAILY_LOSS_LIMIT",
            CloseReason::CriticalStop => "CRITICAL_STOP",
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::TakeProfit => "TAKE_PROFIT",
            CloseReason::PartialTakeProfit => "PARTIAL_TAKE_PROFIT",
            CloseReason::Reversal => "REVERSAL",
            CloseReason::Rebalance => "REBALANCE",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
