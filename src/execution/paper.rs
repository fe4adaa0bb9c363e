//! Paper trading executor

use super::{Fill, Order, OrderExecutor, OrderId};
use crate::commission::CommissionSchedule;
use crate::signal::Direction;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fills every order immediately at its reference price and charges commission
pub struct PaperExecutor {
    commission: CommissionSchedule,
    fills: Arc<RwLock<Vec<Fill>>>,
}

impl PaperExecutor {
    /// Create a new paper executor
    pub fn new(commission: CommissionSchedule) -> Self {
        Self {
            commission,
            fills: Arc::new(RwLock::new(vec![])),
        }
    }

    /// All fills so far, oldest first
    pub async fn fills(&self) -> Vec<Fill> {
        self.fills.read().await.clone()
    }
}

#[async_trait]
impl OrderExecutor for PaperExecutor {
    async fn submit(&self, order: Order) -> anyhow::Result<Fill> {
        if order.direction == Direction::None {
            anyhow::bail!("Order for {} has no direction", order.instrument);
        }
        if order.quantity <= Decimal::ZERO || order.price <= Decimal::ZERO {
            anyhow::bail!(
                "Order for {} needs positive quantity and price, got {} @ {}",
                order.instrument,
                order.quantity,
                order.price
            );
        }

        let (_, fees) =
            self.commission
                .apply_commission(order.price, order.quantity, &order.category)?;
        let order_id = OrderId::new_v4();
        let fill = Fill {
            order_id,
            instrument: order.instrument,
            direction: order.direction,
            price: order.price,
            quantity: order.quantity,
            timestamp: Utc::now(),
            fees,
        };

        self.fills.write().await.push(fill.clone());

        tracing::info!(
            ?order_id,
            instrument = %fill.instrument,
            direction = %fill.direction,
            quantity = %fill.quantity,
            price = %fill.price,
            fees = %fill.fees,
            "Paper order filled"
        );
        Ok(fill)
    }
}
