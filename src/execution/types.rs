//! Execution types

use crate::signal::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// An order to be submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Instrument identifier
    pub instrument: String,
    /// BUY or SELL
    pub direction: Direction,
    /// Units to trade, always positive
    pub quantity: Decimal,
    /// Reference price the order was sized at
    pub price: Decimal,
    /// Commission category
    pub category: String,
}

impl Order {
    pub fn new(
        instrument: impl Into<String>,
        direction: Direction,
        quantity: Decimal,
        price: Decimal,
        category: impl Into<String>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            direction,
            quantity,
            price,
            category: category.into(),
        }
    }

    /// Quantity times price
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}

/// A fill (executed trade)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Order ID
    pub order_id: OrderId,
    /// Instrument identifier
    pub instrument: String,
    /// Trade direction
    pub direction: Direction,
    /// Fill price
    pub price: Decimal,
    /// Filled units
    pub quantity: Decimal,
    /// Fill timestamp
    pub timestamp: DateTime<Utc>,
    /// Fees paid
    pub fees: Decimal,
}

impl Fill {
    /// Cash received for a SELL fill, net of fees
    pub fn net_proceeds(&self) -> Decimal {
        self.quantity * self.price - self.fees
    }

    /// Cash spent on a BUY fill, fees included
    pub fn total_cost(&self) -> Decimal {
        self.quantity * self.price + self.fees
    }

    /// Signed cash change of this fill
    pub fn cash_delta(&self) -> Decimal {
        match self.direction {
            Direction::Buy => -self.total_cost(),
            Direction::Sell => self.net_proceeds(),
            Direction::None => -self.fees,
        }
    }
}
