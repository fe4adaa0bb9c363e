//! Execution module
//!
//! Order submission behind a trait so the account loop can run against a
//! broker gateway or the bundled paper executor

mod paper;
mod types;

pub use paper::PaperExecutor;
pub use types::{Fill, Order, OrderId};

use async_trait::async_trait;

/// Trait for order execution implementations
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Submit an order; `Ok` means it filled
    async fn submit(&self, order: Order) -> anyhow::Result<Fill>;
}
