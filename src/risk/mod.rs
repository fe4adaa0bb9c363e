//! Risk management module
//!
//! Account state, the position book, sizing, the daily loss breaker and
//! per-position lifecycle evaluation

mod account;
mod lifecycle;
mod limits;
mod position;
mod sizing;
mod types;

pub use account::Account;
pub use lifecycle::{MarketSnapshot, PositionAction, PositionManager};
pub use limits::{BreakerState, DailyLossBreaker};
pub use position::{ClosedPosition, Position, PositionBook};
pub use sizing::PositionSizer;
pub use types::{CloseReason, RiskError, Side};
