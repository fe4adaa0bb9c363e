//! Commission model
//!
//! Fee per order is `order_value * rate + fixed` for the instrument's category,
//! rounded to cents and never below the configured minimum.

use crate::config::{CommissionConfig, CommissionRate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use thiserror::Error;

/// Commission lookup errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommissionError {
    /// Neither the requested category nor the default category has an entry
    #[error("No commission entry for category {category:?} or default {default:?}")]
    UnknownCategory { category: String, default: String },
}

/// Category to fee table
#[derive(Debug, Clone)]
pub struct CommissionSchedule {
    entries: HashMap<String, CommissionRate>,
    default_category: String,
    min_fee: Decimal,
}

impl CommissionSchedule {
    pub fn new(
        entries: HashMap<String, CommissionRate>,
        default_category: impl Into<String>,
        min_fee: Decimal,
    ) -> Self {
        Self {
            entries,
            default_category: default_category.into(),
            min_fee,
        }
    }

    /// Build from the `[commission]` config section
    pub fn from_config(config: &CommissionConfig) -> Self {
        Self::new(
            config.categories.clone(),
            config.default_category.clone(),
            config.min_fee,
        )
    }

    /// Smallest fee ever charged
    pub fn min_fee(&self) -> Decimal {
        self.min_fee
    }

    fn rate_for(&self, category: &str) -> Result<&CommissionRate, CommissionError> {
        self.entries
            .get(category)
            .or_else(|| self.entries.get(&self.default_category))
            .ok_or_else(|| CommissionError::UnknownCategory {
                category: category.to_string(),
                default: self.default_category.clone(),
            })
    }

    /// Fee for an order of `order_value` in `category`
    pub fn commission(&self, order_value: Decimal, category: &str) -> Result<Decimal, CommissionError> {
        let rate = self.rate_for(category)?;
        let fee = (order_value * rate.rate + rate.fixed)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        Ok(fee.max(self.min_fee))
    }

    /// Returns `(price * quantity - fee, fee)`
    pub fn apply_commission(
        &self,
        price: Decimal,
        quantity: Decimal,
        category: &str,
    ) -> Result<(Decimal, Decimal), CommissionError> {
        let gross = price * quantity;
        let fee = self.commission(gross, category)?;
        Ok((gross - fee, fee))
    }
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        Self::from_config(&CommissionConfig::default())
    }
}
