//! Daily loss circuit breaker

use super::Account;
use crate::config::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of a breaker check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Loss below both thresholds
    Clear,
    /// Soft daily loss limit reached; carries the loss fraction
    SoftBreach(Decimal),
    /// Critical threshold reached; trading must halt
    CriticalBreach(Decimal),
}

/// Compares the day's loss against the account's soft limit and a critical threshold
#[derive(Debug, Clone)]
pub struct DailyLossBreaker {
    /// Loss fraction that halts the account
    pub critical_loss_pct: Decimal,
}

impl DailyLossBreaker {
    /// Create a new breaker
    pub fn new(critical_loss_pct: Decimal) -> Self {
        Self { critical_loss_pct }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.critical_loss_pct)
    }

    /// Check the account's loss since the start of the day.
    ///
    /// The critical threshold wins over the soft one. An account with a
    /// non-positive start-of-day balance is never in breach.
    pub fn check(&self, account: &Account) -> BreakerState {
        if account.start_of_day_balance <= Decimal::ZERO {
            return BreakerState::Clear;
        }

        let loss_pct = account.daily_loss_pct();
        if loss_pct >= self.critical_loss_pct {
            BreakerState::CriticalBreach(loss_pct)
        } else if loss_pct >= account.daily_loss_limit {
            BreakerState::SoftBreach(loss_pct)
        } else {
            BreakerState::Clear
        }
    }
}

impl Default for DailyLossBreaker {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use rust_decimal_macros::dec;

    fn account(equity: Decimal) -> Account {
        let mut account = Account::from_config(&AccountConfig {
            id: "test".to_string(),
            initial_balance: dec!(100000),
            leverage: dec!(3),
            risk_per_trade: dec!(0.02),
            daily_loss_limit: dec!(0.10),
        });
        account.equity = equity;
        account
    }

    #[test]
    fn test_soft_breach_at_threshold() {
        let breaker = DailyLossBreaker::default();
        assert_eq!(
            breaker.check(&account(dec!(90000))),
            BreakerState::SoftBreach(dec!(0.10))
        );
    }

    #[test]
    fn test_no_breach_just_below_threshold() {
        let breaker = DailyLossBreaker::default();
        // loss 0.0999999
        assert_eq!(breaker.check(&account(dec!(90000.01))), BreakerState::Clear);
    }

    #[test]
    fn test_critical_preempts_soft() {
        let breaker = DailyLossBreaker::default();
        assert_eq!(
            breaker.check(&account(dec!(70000))),
            BreakerState::CriticalBreach(dec!(0.30))
        );
        assert!(matches!(
            breaker.check(&account(dec!(50000))),
            BreakerState::CriticalBreach(_)
        ));
    }

    #[test]
    fn test_profit_is_clear() {
        let breaker = DailyLossBreaker::default();
        assert_eq!(breaker.check(&account(dec!(120000))), BreakerState::Clear);
    }

    #[test]
    fn test_zero_start_balance_is_clear() {
        let breaker = DailyLossBreaker::default();
        let mut acc = account(dec!(-5));
        acc.start_of_day_balance = Decimal::ZERO;
        assert_eq!(breaker.check(&acc), BreakerState::Clear);
    }
}
