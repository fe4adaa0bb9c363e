//! Frees cash by closing the weakest long positions

use crate::execution::{Order, OrderExecutor};
use crate::retry::RetryPolicy;
use crate::risk::{Account, CloseReason, PositionBook, Side};
use crate::telemetry::{record_close, record_order};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Closes longs worst-first until enough cash is free
#[derive(Debug, Default, Clone)]
pub struct Rebalancer {
    retry: RetryPolicy,
}

impl Rebalancer {
    /// Close orders are retried with `retry`
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Close positions in ascending unrealized P&L order until `cash_needed`
    /// has been freed. Shorts are never closed here; closing one consumes cash.
    ///
    /// Returns the net proceeds credited to `account.cash`, which may fall short
    /// of `cash_needed` when candidates run out or orders fail.
    pub async fn rebalance(
        &self,
        account: &mut Account,
        book: &mut PositionBook,
        marks: &HashMap<String, Decimal>,
        cash_needed: Decimal,
        executor: &dyn OrderExecutor,
    ) -> Decimal {
        let mut freed = Decimal::ZERO;
        if cash_needed <= Decimal::ZERO {
            return freed;
        }

        let mut candidates: Vec<(Decimal, String)> = book
            .iter()
            .filter(|p| p.side == Side::Long)
            .filter_map(|p| {
                marks
                    .get(&p.instrument)
                    .map(|&mark| (p.unrealized_pnl(mark), p.instrument.clone()))
            })
            .collect();
        candidates.sort();

        for (pnl, instrument) in candidates {
            if freed >= cash_needed {
                break;
            }
            let Some(position) = book.get(&instrument) else {
                continue;
            };
            let Some(&mark) = marks.get(&instrument) else {
                continue;
            };

            let order = Order::new(
                instrument.clone(),
                position.side.exit_direction(),
                position.abs_quantity(),
                mark,
                position.category.clone(),
            );
            let result = self
                .retry
                .run("rebalance_close", || executor.submit(order.clone()))
                .await;
            record_order(result.is_ok());
            let fill = match result {
                Ok(fill) => fill,
                Err(e) => {
                    tracing::warn!(
                        %instrument,
                        error = %e,
                        "Rebalance close failed, trying next position"
                    );
                    continue;
                }
            };

            if let Some(closed) = book.close(&instrument, &fill, CloseReason::Rebalance) {
                let proceeds = fill.net_proceeds();
                account.cash += proceeds;
                freed += proceeds;
                tracing::info!(
                    target: "trades",
                    action = "CLOSE",
                    %instrument,
                    direction = %fill.direction,
                    quantity = %fill.quantity,
                    price = %fill.price,
                    reason = %CloseReason::Rebalance,
                    realized_pnl = %closed.realized_pnl,
                    unrealized_pnl = %pnl,
                    "Position closed to free cash"
                );
                record_close(CloseReason::Rebalance);
            }
        }

        if freed < cash_needed {
            tracing::warn!(%freed, %cash_needed, "Rebalance freed less cash than requested");
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::execution::Fill;
    use crate::feed::InstrumentMeta;
    use async_trait::async_trait;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    /// Fills at the order price with no fees, failing for listed instruments.
    /// Instruments in `fail_once` reject their first order only.
    #[derive(Default)]
    struct Recorder {
        fail: Vec<String>,
        fail_once: Mutex<Vec<String>>,
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OrderExecutor for Recorder {
        async fn submit(&self, order: Order) -> anyhow::Result<Fill> {
            if self.fail.contains(&order.instrument) {
                anyhow::bail!("rejected");
            }
            {
                let mut once = self.fail_once.lock().unwrap();
                if let Some(i) = once.iter().position(|id| id == &order.instrument) {
                    once.remove(i);
                    anyhow::bail!("gateway timeout");
                }
            }
            self.submitted.lock().unwrap().push(order.instrument.clone());
            Ok(Fill {
                order_id: Uuid::new_v4(),
                instrument: order.instrument,
                direction: order.direction,
                price: order.price,
                quantity: order.quantity,
                timestamp: Utc::now(),
                fees: Decimal::ZERO,
            })
        }
    }

    fn rebalancer() -> Rebalancer {
        Rebalancer::new(RetryPolicy::new(2, Duration::ZERO, 2))
    }

    fn account() -> Account {
        Account::from_config(&AccountConfig {
            id: "test".to_string(),
            initial_balance: dec!(0),
            leverage: dec!(1),
            risk_per_trade: dec!(0.02),
            daily_loss_limit: dec!(0.10),
        })
    }

    fn open(book: &mut PositionBook, id: &str, side: Side, qty: Decimal, entry: Decimal) {
        let fill = Fill {
            order_id: Uuid::new_v4(),
            instrument: id.to_string(),
            direction: side.entry_direction(),
            price: entry,
            quantity: qty,
            timestamp: Utc::now(),
            fees: Decimal::ZERO,
        };
        book.open(&InstrumentMeta::new(id, "stocks"), side, &fill, dec!(0), dec!(0))
            .unwrap();
    }

    /// A: +100, B: -50, C: +10 at mark 100
    fn book_and_marks() -> (PositionBook, HashMap<String, Decimal>) {
        let mut book = PositionBook::new();
        open(&mut book, "A", Side::Long, dec!(10), dec!(90));
        open(&mut book, "B", Side::Long, dec!(10), dec!(105));
        open(&mut book, "C", Side::Long, dec!(10), dec!(99));
        let marks = ["A", "B", "C"]
            .iter()
            .map(|id| (id.to_string(), dec!(100)))
            .collect();
        (book, marks)
    }

    #[tokio::test]
    async fn test_closes_worst_first_until_enough() {
        let (mut book, marks) = book_and_marks();
        let mut acc = account();
        let executor = Recorder::default();

        let freed = rebalancer()
            .rebalance(&mut acc, &mut book, &marks, dec!(1500), &executor)
            .await;

        assert_eq!(freed, dec!(2000));
        assert_eq!(acc.cash, dec!(2000));
        assert_eq!(*executor.submitted.lock().unwrap(), vec!["B", "C"]);
        assert!(book.contains("A"));
        assert!(!book.contains("B"));
        assert_eq!(book.closed()[0].reason, CloseReason::Rebalance);
    }

    #[tokio::test]
    async fn test_failed_order_skips_position() {
        let (mut book, marks) = book_and_marks();
        let mut acc = account();
        let executor = Recorder {
            fail: vec!["B".to_string()],
            ..Recorder::default()
        };

        let freed = rebalancer()
            .rebalance(&mut acc, &mut book, &marks, dec!(500), &executor)
            .await;

        assert_eq!(freed, dec!(1000));
        assert!(book.contains("B"));
        assert!(!book.contains("C"));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (mut book, marks) = book_and_marks();
        let mut acc = account();
        let executor = Recorder {
            fail_once: Mutex::new(vec!["B".to_string()]),
            ..Recorder::default()
        };

        let freed = rebalancer()
            .rebalance(&mut acc, &mut book, &marks, dec!(500), &executor)
            .await;

        assert_eq!(freed, dec!(1000));
        assert!(!book.contains("B"));
        assert!(book.contains("C"));
        assert_eq!(*executor.submitted.lock().unwrap(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_shorts_and_unmarked_are_ignored() {
        let mut book = PositionBook::new();
        open(&mut book, "S", Side::Short, dec!(10), dec!(100));
        open(&mut book, "U", Side::Long, dec!(10), dec!(100));
        let marks = HashMap::from([("S".to_string(), dec!(120))]);
        let mut acc = account();

        let freed = rebalancer()
            .rebalance(&mut acc, &mut book, &marks, dec!(100), &Recorder::default())
            .await;

        assert_eq!(freed, Decimal::ZERO);
        assert_eq!(book.len(), 2);
    }

    #[tokio::test]
    async fn test_returns_partial_amount_when_short_of_target() {
        let (mut book, marks) = book_and_marks();
        let mut acc = account();
        let freed = rebalancer()
            .rebalance(&mut acc, &mut book, &marks, dec!(1000000), &Recorder::default())
            .await;
        assert_eq!(freed, dec!(3000));
        assert!(book.is_empty());
    }

    proptest! {
        #[test]
        fn prop_freed_bounded_and_worst_first(
            entries in prop::collection::vec((1i64..200, 1i64..50), 1..8),
            needed in 0i64..20_000,
        ) {
            let mut book = PositionBook::new();
            let mut marks = HashMap::new();
            for (i, (entry, qty)) in entries.iter().enumerate() {
                let id = format!("I{i}");
                open(&mut book, &id, Side::Long, Decimal::from(*qty), Decimal::from(*entry));
                marks.insert(id, dec!(100));
            }
            let total_value = book.market_value(&marks);
            let mut acc = account();
            let executor = Recorder::default();

            let freed = tokio_test::block_on(rebalancer().rebalance(
                &mut acc,
                &mut book,
                &marks,
                Decimal::from(needed),
                &executor,
            ));

            prop_assert!(freed <= total_value);
            let pnls: Vec<Decimal> = book.closed().iter().map(|c| c.realized_pnl).collect();
            prop_assert!(pnls.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
