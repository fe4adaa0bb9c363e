//! Position tracking

use super::types::{CloseReason, Side};
use super::RiskError;
use crate::execution::Fill;
use crate::feed::InstrumentMeta;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument identifier
    pub instrument: String,
    /// Trade side
    pub side: Side,
    /// Signed size: positive long, negative short, never zero
    pub quantity: Decimal,
    /// Average entry price
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Last level set by the trailing stop
    pub trailing_stop: Decimal,
    /// Entry timestamp
    pub opened_at: DateTime<Utc>,
    /// Add-ons applied since entry
    pub pyramid_steps: u32,
    /// First partial take-profit already filled
    #[serde(default)]
    pub partial_taken: bool,
    /// Commission category
    pub category: String,
    /// Entry fees not yet charged against realized P&L
    #[serde(default)]
    pub fees_paid: Decimal,
}

impl Position {
    /// Unsigned size
    pub fn abs_quantity(&self) -> Decimal {
        self.quantity.abs()
    }

    /// Profit as a fraction of entry price, positive when the move favours the side
    pub fn profit_pct(&self, price: Decimal) -> Decimal {
        if self.entry_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self.side {
            Side::Long => (price - self.entry_price) / self.entry_price,
            Side::Short => (self.entry_price - price) / self.entry_price,
        }
    }

    /// Mark-to-market P&L before fees
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.quantity
    }

    /// Signed market value; negative for shorts
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }

    /// Time since entry
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.opened_at
    }
}

/// A closed position or a closed slice of one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    /// Position snapshot; `quantity` is the closed amount
    pub position: Position,
    /// Exit price
    pub exit_price: Decimal,
    /// Exit timestamp
    pub exit_time: DateTime<Utc>,
    /// Realized P&L net of entry and exit fees
    pub realized_pnl: Decimal,
    /// Entry and exit fees charged to this slice
    pub fees: Decimal,
    pub reason: CloseReason,
}

/// Open positions keyed by instrument, at most one each
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: HashMap<String, Position>,
    closed: Vec<ClosedPosition>,
}

impl PositionBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn get_mut(&mut self, instrument: &str) -> Option<&mut Position> {
        self.positions.get_mut(instrument)
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.positions.contains_key(instrument)
    }

    /// Number of open positions
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Closed history, oldest first
    pub fn closed(&self) -> &[ClosedPosition] {
        &self.closed
    }

    /// Record a new position from its entry fill
    pub fn open(
        &mut self,
        meta: &InstrumentMeta,
        side: Side,
        fill: &Fill,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Result<&Position, RiskError> {
        if fill.quantity <= Decimal::ZERO {
            return Err(RiskError::ZeroQuantity(meta.id.clone()));
        }
        if self.positions.contains_key(&meta.id) {
            return Err(RiskError::PositionExists(meta.id.clone()));
        }

        let quantity = match side {
            Side::Long => fill.quantity,
            Side::Short => -fill.quantity,
        };
        let position = Position {
            instrument: meta.id.clone(),
            side,
            quantity,
            entry_price: fill.price,
            stop_loss,
            take_profit,
            trailing_stop: stop_loss,
            opened_at: fill.timestamp,
            pyramid_steps: 0,
            partial_taken: false,
            category: meta.category.clone(),
            fees_paid: fill.fees,
        };

        Ok(self.positions.entry(meta.id.clone()).or_insert(position))
    }

    /// Close the whole position. Returns `None` when nothing is open.
    pub fn close(
        &mut self,
        instrument: &str,
        fill: &Fill,
        reason: CloseReason,
    ) -> Option<ClosedPosition> {
        let position = self.positions.remove(instrument)?;
        let closed = Self::settle(position, fill, reason);
        self.closed.push(closed.clone());
        Some(closed)
    }

    /// Close `fill.quantity` of a position and mark the partial exit taken.
    /// The entry is removed when nothing is left.
    pub fn reduce(
        &mut self,
        instrument: &str,
        fill: &Fill,
        reason: CloseReason,
    ) -> Option<ClosedPosition> {
        let position = self.positions.get_mut(instrument)?;
        let remaining = position.abs_quantity() - fill.quantity;
        if remaining <= Decimal::ZERO {
            return self.close(instrument, fill, reason);
        }

        let closed_qty = fill.quantity;
        let fee_share = position.fees_paid * closed_qty / position.abs_quantity();
        let mut slice = position.clone();
        slice.quantity = match position.side {
            Side::Long => closed_qty,
            Side::Short => -closed_qty,
        };
        slice.fees_paid = fee_share;

        position.quantity = match position.side {
            Side::Long => remaining,
            Side::Short => -remaining,
        };
        position.fees_paid -= fee_share;
        position.partial_taken = true;

        let closed = Self::settle(slice, fill, reason);
        self.closed.push(closed.clone());
        Some(closed)
    }

    /// Add a same-side fill, averaging the entry price
    pub fn scale_in(&mut self, instrument: &str, fill: &Fill) -> Option<&Position> {
        let position = self.positions.get_mut(instrument)?;
        let old_qty = position.abs_quantity();
        let new_qty = old_qty + fill.quantity;

        position.entry_price = (position.entry_price * old_qty + fill.price * fill.quantity) / new_qty;
        position.quantity = match position.side {
            Side::Long => new_qty,
            Side::Short => -new_qty,
        };
        position.fees_paid += fill.fees;
        position.pyramid_steps += 1;
        Some(position)
    }

    fn settle(position: Position, fill: &Fill, reason: CloseReason) -> ClosedPosition {
        let gross = position.unrealized_pnl(fill.price);
        let fees = position.fees_paid + fill.fees;
        ClosedPosition {
            exit_price: fill.price,
            exit_time: fill.timestamp,
            realized_pnl: gross - fees,
            fees,
            reason,
            position,
        }
    }

    /// Signed market value of every position with a mark
    pub fn market_value(&self, marks: &HashMap<String, Decimal>) -> Decimal {
        self.positions
            .values()
            .filter_map(|p| marks.get(&p.instrument).map(|&m| p.market_value(m)))
            .sum()
    }

    /// Unrealized P&L of every position with a mark
    pub fn unrealized_pnl(&self, marks: &HashMap<String, Decimal>) -> Decimal {
        self.positions
            .values()
            .filter_map(|p| marks.get(&p.instrument).map(|&m| p.unrealized_pnl(m)))
            .sum()
    }

    /// Sum of realized P&L over the closed history
    pub fn realized_pnl(&self) -> Decimal {
        self.closed.iter().map(|c| c.realized_pnl).sum()
    }
}
