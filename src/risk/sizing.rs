//! Position sizing
//!
//! Two modes: volatility sizing for new entries (risk budget over ATR) and
//! cash-capped sizing for add-ons and cash-limited trades. Quantities are in
//! units and always a whole number of lots; zero means "do not trade".

use super::Account;
use crate::config::SizingConfig;
use crate::feed::InstrumentMeta;
use rust_decimal::Decimal;

/// Converts a risk budget or free cash into an order quantity
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Share of free cash never allocated (e.g., 0.05 = 5%)
    pub cash_reserve_pct: Decimal,
}

impl PositionSizer {
    /// Create a new sizer
    pub fn new(cash_reserve_pct: Decimal) -> Self {
        Self { cash_reserve_pct }
    }

    /// Create from SizingConfig
    pub fn from_config(config: &SizingConfig) -> Self {
        Self::new(config.cash_reserve_pct)
    }

    fn lot(meta: &InstrumentMeta) -> Decimal {
        if meta.lot > Decimal::ZERO {
            meta.lot
        } else {
            Decimal::ONE
        }
    }

    /// Zero unless `quantity` reaches the instrument's minimum lot count
    fn enforce_min_lot(meta: &InstrumentMeta, quantity: Decimal) -> Decimal {
        if quantity < meta.min_lot * Self::lot(meta) {
            Decimal::ZERO
        } else {
            quantity
        }
    }

    /// Volatility sizing: `floor(equity * leverage * risk_per_trade / (atr * price) / lot)`
    /// lots, at least one.
    ///
    /// Without a usable price or ATR the result is a single lot.
    pub fn size_new_position(
        &self,
        account: &Account,
        meta: &InstrumentMeta,
        price: Decimal,
        atr: Decimal,
    ) -> Decimal {
        let lot = Self::lot(meta);
        if price <= Decimal::ZERO || atr <= Decimal::ZERO {
            tracing::warn!(
                instrument = %meta.id,
                %price,
                %atr,
                "No volatility estimate, sizing a single lot"
            );
            return Self::enforce_min_lot(meta, lot);
        }

        let risk_amount = account.equity * account.leverage * account.risk_per_trade;
        let lots = (risk_amount / (atr * price) / lot).floor().max(Decimal::ONE);
        Self::enforce_min_lot(meta, lots * lot)
    }

    /// Cash-capped sizing: spend at most `free_cash * (1 - reserve) * confidence`
    pub fn size_scaled_position(
        &self,
        meta: &InstrumentMeta,
        free_cash: Decimal,
        price: Decimal,
        confidence: Decimal,
    ) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let confidence = confidence.clamp(Decimal::ZERO, Decimal::ONE);
        let alloc = free_cash * (Decimal::ONE - self.cash_reserve_pct) * confidence;
        let lot = Self::lot(meta);
        let lots = (alloc / price / lot).floor().max(Decimal::ZERO);
        Self::enforce_min_lot(meta, lots * lot)
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::from_config(&SizingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> Account {
        Account::from_config(&AccountConfig {
            id: "test".to_string(),
            initial_balance: balance,
            leverage: dec!(3),
            risk_per_trade: dec!(0.02),
            daily_loss_limit: dec!(0.10),
        })
    }

    fn meta() -> InstrumentMeta {
        InstrumentMeta::new("SBER", "stocks")
    }

    #[test]
    fn test_volatility_sizing() {
        let sizer = PositionSizer::default();
        // risk 6000 / (2 * 100) = 30
        let qty = sizer.size_new_position(&account(dec!(100000)), &meta(), dec!(100), dec!(2));
        assert_eq!(qty, dec!(30));
    }

    #[test]
    fn test_volatility_sizing_floors_to_one_lot() {
        let sizer = PositionSizer::default();
        let qty = sizer.size_new_position(&account(dec!(100)), &meta(), dec!(1000), dec!(50));
        assert_eq!(qty, dec!(1));
    }

    #[test]
    fn test_volatility_sizing_zero_atr_fallback() {
        let sizer = PositionSizer::default();
        let qty = sizer.size_new_position(&account(dec!(100000)), &meta(), dec!(100), dec!(0));
        assert_eq!(qty, dec!(1));
        let qty = sizer.size_new_position(&account(dec!(100000)), &meta(), dec!(0), dec!(2));
        assert_eq!(qty, dec!(1));
    }

    #[test]
    fn test_volatility_sizing_respects_lot() {
        let sizer = PositionSizer::default();
        let mut meta = meta();
        meta.lot = dec!(10);
        // raw 30 units = 3 lots
        let qty = sizer.size_new_position(&account(dec!(100000)), &meta, dec!(100), dec!(2));
        assert_eq!(qty, dec!(30));

        meta.min_lot = dec!(5);
        let qty = sizer.size_new_position(&account(dec!(100000)), &meta, dec!(100), dec!(2));
        assert_eq!(qty, dec!(0));
    }

    #[test]
    fn test_cash_capped_sizing() {
        let sizer = PositionSizer::new(dec!(0.05));
        // alloc = 10000 * 0.95 * 0.5 = 4750 -> 95
        let qty = sizer.size_scaled_position(&meta(), dec!(10000), dec!(50), dec!(0.5));
        assert_eq!(qty, dec!(95));
    }

    #[test]
    fn test_cash_capped_sizing_degenerate_inputs() {
        let sizer = PositionSizer::default();
        assert_eq!(sizer.size_scaled_position(&meta(), dec!(10000), dec!(0), dec!(1)), dec!(0));
        assert_eq!(sizer.size_scaled_position(&meta(), dec!(-500), dec!(50), dec!(1)), dec!(0));
        assert_eq!(sizer.size_scaled_position(&meta(), dec!(40), dec!(50), dec!(1)), dec!(0));
    }

    proptest! {
        #[test]
        fn prop_cash_capped_never_exceeds_allocation(
            cash in 0i64..10_000_000,
            price_cents in 1i64..1_000_000,
            confidence_pct in 0i64..=100,
        ) {
            let sizer = PositionSizer::default();
            let cash = Decimal::from(cash);
            let price = Decimal::new(price_cents, 2);
            let confidence = Decimal::new(confidence_pct, 2);
            let qty = sizer.size_scaled_position(&meta(), cash, price, confidence);
            prop_assert!(qty >= Decimal::ZERO);
            prop_assert!(qty * price <= cash * dec!(0.95) * confidence);
        }
    }
}
