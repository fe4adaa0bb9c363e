//! Account state

use crate::config::AccountConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cash, equity and risk settings for one trading account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Free cash
    pub cash: Decimal,
    /// Cash plus the signed market value of open positions
    pub equity: Decimal,
    /// Equity when the trading day started
    pub start_of_day_balance: Decimal,
    pub leverage: Decimal,
    pub risk_per_trade: Decimal,
    pub daily_loss_limit: Decimal,
    /// False suspends all trading
    pub active: bool,
}

impl Account {
    pub fn from_config(config: &AccountConfig) -> Self {
        Self {
            id: config.id.clone(),
            cash: config.initial_balance,
            equity: config.initial_balance,
            start_of_day_balance: config.initial_balance,
            leverage: config.leverage,
            risk_per_trade: config.risk_per_trade,
            daily_loss_limit: config.daily_loss_limit,
            active: true,
        }
    }

    /// Fractional loss since the start of the day; zero when the start balance is not positive
    pub fn daily_loss_pct(&self) -> Decimal {
        if self.start_of_day_balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.start_of_day_balance - self.equity) / self.start_of_day_balance
    }

    /// Begin a new trading day at the current equity
    pub fn roll_day(&mut self) {
        self.start_of_day_balance = self.equity;
    }
}
