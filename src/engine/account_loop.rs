//! Polling decision loop for one account

use crate::commission::CommissionSchedule;
use crate::config::Config;
use crate::execution::{Fill, Order, OrderExecutor};
use crate::feed::{InstrumentMeta, MarketDataSource};
use crate::indicators::atr;
use crate::notify::{Notifier, Severity};
use crate::portfolio::Rebalancer;
use crate::retry::RetryPolicy;
use crate::risk::{
    Account, BreakerState, CloseReason, MarketSnapshot, PositionAction, PositionBook,
    PositionManager, PositionSizer, Side,
};
use crate::signal::{Classifier, Signal, SignalEngine};
use crate::telemetry::{
    record_close, record_order, record_signal, record_skip, set_gauge, GaugeMetric,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// External services the loop talks to
#[derive(Clone)]
pub struct Collaborators {
    pub feed: Arc<dyn MarketDataSource>,
    pub executor: Arc<dyn OrderExecutor>,
    pub notifier: Arc<dyn Notifier>,
    pub classifier: Option<Arc<dyn Classifier>>,
}

/// What happened during one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Instruments that got a signal evaluation
    pub evaluated: usize,
    /// Instruments skipped for missing data
    pub skipped: usize,
    /// Positions opened, with their side
    pub opened: Vec<(String, Side)>,
    /// Full closes, with their reason
    pub closed: Vec<(String, CloseReason)>,
    /// Partial take-profit exits
    pub partial_closes: Vec<String>,
    /// The account was halted during this cycle
    pub halted: bool,
}

/// Owns one account's state and drives signal, sizing, lifecycle and rebalancing
pub struct AccountLoop {
    account: Account,
    book: PositionBook,
    marks: HashMap<String, Decimal>,
    trading_day: Option<NaiveDate>,

    signals: SignalEngine,
    sizer: PositionSizer,
    manager: PositionManager,
    rebalancer: Rebalancer,
    commission: CommissionSchedule,
    retry: RetryPolicy,

    atr_period: usize,
    history: Duration,
    reversal_confidence: Decimal,

    feed: Arc<dyn MarketDataSource>,
    executor: Arc<dyn OrderExecutor>,
    notifier: Arc<dyn Notifier>,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

impl AccountLoop {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let sizer = PositionSizer::from_config(&config.sizing);
        Self {
            account: Account::from_config(&config.account),
            book: PositionBook::new(),
            marks: HashMap::new(),
            trading_day: None,
            signals: SignalEngine::new(
                config.indicators.clone(),
                &config.signal,
                collaborators.classifier,
            ),
            manager: PositionManager::new(config.risk.clone(), sizer.clone()),
            sizer,
            rebalancer: Rebalancer::new(RetryPolicy::from_config(&config.retry)),
            commission: CommissionSchedule::from_config(&config.commission),
            retry: RetryPolicy::from_config(&config.retry),
            atr_period: config.risk.atr_period,
            history: Duration::try_hours(config.engine.history_hours.max(0))
                .unwrap_or(Duration::MAX),
            reversal_confidence: config.signal.reversal_confidence,
            feed: collaborators.feed,
            executor: collaborators.executor,
            notifier: collaborators.notifier,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PositionBook {
        &mut self.book
    }

    /// Last known price per instrument
    pub fn marks(&self) -> &HashMap<String, Decimal> {
        &self.marks
    }

    fn refresh_equity(&mut self) {
        self.account.equity = self.account.cash + self.book.market_value(&self.marks);
    }

    fn roll_day_if_needed(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.trading_day == Some(today) {
            return;
        }
        if self.trading_day.is_some() {
            self.refresh_equity();
            self.account.roll_day();
            tracing::info!(
                account = %self.account.id,
                start_of_day_balance = %self.account.start_of_day_balance,
                "New trading day"
            );
        }
        self.trading_day = Some(today);
    }

    fn publish_gauges(&self) {
        set_gauge(GaugeMetric::Equity, to_f64(self.account.equity));
        set_gauge(GaugeMetric::Cash, to_f64(self.account.cash));
        set_gauge(GaugeMetric::OpenPositions, self.book.len() as f64);
        set_gauge(GaugeMetric::DailyLossPct, to_f64(self.account.daily_loss_pct()));
        set_gauge(
            GaugeMetric::AccountActive,
            if self.account.active { 1.0 } else { 0.0 },
        );
    }

    /// Run one pass over every instrument
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        if !self.account.active {
            tracing::debug!(account = %self.account.id, "Account inactive, skipping cycle");
            return report;
        }
        self.roll_day_if_needed(now);

        let feed = &self.feed;
        let instruments = match self.retry.run("instruments", move || feed.instruments()).await {
            Ok(instruments) => instruments,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list instruments, skipping cycle");
                return report;
            }
        };

        for meta in &instruments {
            if !self.account.active {
                break;
            }
            self.process_instrument(meta, now, &mut report).await;
        }

        if !self.account.active && !self.book.is_empty() {
            self.flatten(&instruments, &mut report).await;
        }

        self.refresh_equity();
        self.publish_gauges();
        tracing::debug!(
            account = %self.account.id,
            cash = %self.account.cash,
            equity = %self.account.equity,
            positions = self.book.len(),
            "Cycle complete"
        );
        report
    }

    /// Cycle until the account halts, `max_cycles` is reached or Ctrl-C
    pub async fn run(&mut self, interval: std::time::Duration, max_cycles: Option<u64>) {
        let mut cycles = 0u64;
        loop {
            if !self.account.active {
                tracing::warn!(account = %self.account.id, "Account halted, stopping loop");
                break;
            }

            self.run_cycle(Utc::now()).await;
            cycles += 1;
            if max_cycles.is_some_and(|max| cycles >= max) {
                tracing::info!(cycles, "Cycle limit reached");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, stopping loop");
                    break;
                }
            }
        }
    }

    async fn process_instrument(
        &mut self,
        meta: &InstrumentMeta,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let id = meta.id.as_str();
        let feed = &self.feed;
        let from = now
            .checked_sub_signed(self.history)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let bars = match self.retry.run("bars", move || feed.bars(id, from, now)).await {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                tracing::debug!(instrument = id, "No bars, skipping");
                record_skip("no_bars");
                report.skipped += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(instrument = id, error = %e, "Bars unavailable, skipping");
                record_skip("bars_error");
                report.skipped += 1;
                return;
            }
        };

        let price = match self.retry.run("last_price", move || feed.last_price(id)).await {
            Ok(price) if price > Decimal::ZERO => price,
            Ok(price) => {
                tracing::warn!(instrument = id, %price, "Non-positive price, skipping");
                record_skip("bad_price");
                report.skipped += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(instrument = id, error = %e, "Price unavailable, skipping");
                record_skip("price_error");
                report.skipped += 1;
                return;
            }
        };

        self.marks.insert(meta.id.clone(), price);
        self.refresh_equity();
        let atr = atr(&bars, self.atr_period);
        let signal = self.signals.generate_signal(&bars);
        record_signal(signal.direction);
        report.evaluated += 1;

        let Some(side) = self.book.get(id).map(|p| p.side) else {
            if let Some(side) = Side::from_direction(signal.direction) {
                self.open_position(meta, side, price, atr, report).await;
            }
            return;
        };

        let closed = self.manage_position(meta, price, atr, now, report).await;
        if !self.account.active {
            return;
        }

        let reverses = signal.direction == side.exit_direction()
            && signal.confidence >= self.reversal_confidence;
        match closed {
            Some(CloseReason::TakeProfit) if reverses => {
                tracing::info!(
                    instrument = id,
                    confidence = %signal.confidence,
                    "Auto-reversal after take-profit"
                );
                self.open_position(meta, side.opposite(), price, atr, report).await;
            }
            None if reverses && self.book.contains(id) => {
                self.reverse(meta, side, &signal, price, atr, report).await;
            }
            _ => {}
        }
    }

    async fn reverse(
        &mut self,
        meta: &InstrumentMeta,
        side: Side,
        signal: &Signal,
        price: Decimal,
        atr: Decimal,
        report: &mut CycleReport,
    ) {
        tracing::info!(
            instrument = %meta.id,
            from = ?side,
            confidence = %signal.confidence,
            "Trend reversal"
        );
        if self
            .close_position(&meta.id, CloseReason::Reversal, price, report)
            .await
        {
            self.open_position(meta, side.opposite(), price, atr, report).await;
        }
    }

    /// Evaluate and act on an open position; returns the reason if it was fully closed
    async fn manage_position(
        &mut self,
        meta: &InstrumentMeta,
        price: Decimal,
        atr: Decimal,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Option<CloseReason> {
        let snapshot = MarketSnapshot { price, atr, now };
        let actions = {
            let position = self.book.get_mut(&meta.id)?;
            self.manager
                .evaluate_position(&mut self.account, position, meta, snapshot)
        };
        if !self.account.active {
            report.halted = true;
        }

        for action in actions {
            match action {
                PositionAction::UpdateStop(stop) => {
                    tracing::debug!(instrument = %meta.id, %stop, "Stop moved");
                }
                PositionAction::UpdateTarget(target) => {
                    tracing::debug!(instrument = %meta.id, %target, "Target moved");
                }
                PositionAction::Notify { severity, message } => {
                    self.notifier.notify(severity, &message).await;
                }
                PositionAction::Close(reason) => {
                    return self
                        .close_position(&meta.id, reason, price, report)
                        .await
                        .then_some(reason);
                }
                PositionAction::PartialClose { fraction, quantity } => {
                    self.partial_close(meta, fraction, quantity, price, report)
                        .await;
                }
                PositionAction::ScaleIn(quantity) => {
                    self.scale_in(meta, quantity, price).await;
                }
            }
        }
        None
    }

    async fn submit(&self, order: Order) -> Option<Fill> {
        let executor = &self.executor;
        let instrument = order.instrument.clone();
        let result = self
            .retry
            .run("submit_order", move || executor.submit(order.clone()))
            .await;
        record_order(result.is_ok());
        match result {
            Ok(fill) => Some(fill),
            Err(e) => {
                tracing::error!(%instrument, error = %e, "Order failed");
                None
            }
        }
    }

    /// Fee-inclusive cash needed to trade `quantity` at `price`
    fn order_cost(&self, meta: &InstrumentMeta, quantity: Decimal, price: Decimal) -> Option<Decimal> {
        let notional = quantity * price;
        match self.commission.commission(notional, &meta.category) {
            Ok(fee) => Some(notional + fee),
            Err(e) => {
                tracing::error!(instrument = %meta.id, error = %e, "Commission lookup failed");
                None
            }
        }
    }

    async fn open_position(
        &mut self,
        meta: &InstrumentMeta,
        side: Side,
        price: Decimal,
        atr: Decimal,
        report: &mut CycleReport,
    ) {
        if !self.account.active {
            return;
        }
        let breaker = self.manager.breaker().check(&self.account);
        if breaker != BreakerState::Clear {
            tracing::info!(instrument = %meta.id, ?breaker, "Loss limit reached, no new entries");
            return;
        }

        let quantity = self.sizer.size_new_position(&self.account, meta, price, atr);
        if quantity <= Decimal::ZERO {
            tracing::debug!(instrument = %meta.id, "Size below minimum lot, not trading");
            return;
        }
        let Some(cost) = self.order_cost(meta, quantity, price) else {
            return;
        };

        if self.account.cash < cost {
            let needed = cost - self.account.cash;
            let closed_before = self.book.closed().len();
            let freed = self
                .rebalancer
                .rebalance(
                    &mut self.account,
                    &mut self.book,
                    &self.marks,
                    needed,
                    self.executor.as_ref(),
                )
                .await;
            report.closed.extend(
                self.book.closed()[closed_before..]
                    .iter()
                    .map(|c| (c.position.instrument.clone(), c.reason)),
            );
            if self.account.cash < cost {
                tracing::info!(
                    instrument = %meta.id,
                    %cost,
                    %freed,
                    cash = %self.account.cash,
                    "Not enough cash after rebalancing, trade aborted"
                );
                return;
            }
        }

        let order = Order::new(
            meta.id.clone(),
            side.entry_direction(),
            quantity,
            price,
            meta.category.clone(),
        );
        let Some(fill) = self.submit(order).await else {
            return;
        };

        self.account.cash += fill.cash_delta();
        let (stop, target) = self.manager.initial_levels(fill.price, side, atr);
        match self.book.open(meta, side, &fill, stop, target) {
            Ok(_) => {
                tracing::info!(
                    target: "trades",
                    action = "OPEN",
                    instrument = %meta.id,
                    direction = %fill.direction,
                    quantity = %fill.quantity,
                    price = %fill.price,
                    fees = %fill.fees,
                    %stop,
                    %target,
                    "Position opened"
                );
                report.opened.push((meta.id.clone(), side));
                self.notifier
                    .notify(
                        Severity::Info,
                        &format!(
                            "Opened {} {} x{} @ {}",
                            fill.direction, meta.id, fill.quantity, fill.price
                        ),
                    )
                    .await;
            }
            Err(e) => tracing::error!(instrument = %meta.id, error = %e, "Fill not recorded"),
        }
        self.refresh_equity();
    }

    /// Close a whole position at `price`; false if the order failed or nothing was open
    async fn close_position(
        &mut self,
        instrument: &str,
        reason: CloseReason,
        price: Decimal,
        report: &mut CycleReport,
    ) -> bool {
        let Some(position) = self.book.get(instrument) else {
            return false;
        };
        let order = Order::new(
            instrument,
            position.side.exit_direction(),
            position.abs_quantity(),
            price,
            position.category.clone(),
        );
        let Some(fill) = self.submit(order).await else {
            return false;
        };

        self.account.cash += fill.cash_delta();
        let Some(closed) = self.book.close(instrument, &fill, reason) else {
            return false;
        };
        self.refresh_equity();
        record_close(reason);
        report.closed.push((instrument.to_string(), reason));

        tracing::info!(
            target: "trades",
            action = "CLOSE",
            instrument,
            direction = %fill.direction,
            quantity = %fill.quantity,
            price = %fill.price,
            %reason,
            realized_pnl = %closed.realized_pnl,
            "Position closed"
        );
        let severity = match reason {
            CloseReason::CriticalStop | CloseReason::DailyLossLimit => Severity::Warning,
            _ => Severity::Info,
        };
        self.notifier
            .notify(
                severity,
                &format!(
                    "Closed {} x{} @ {} ({}), P&L {}",
                    instrument,
                    fill.quantity,
                    fill.price,
                    reason,
                    closed.realized_pnl.round_dp(2)
                ),
            )
            .await;
        true
    }

    async fn partial_close(
        &mut self,
        meta: &InstrumentMeta,
        fraction: Decimal,
        quantity: Decimal,
        price: Decimal,
        report: &mut CycleReport,
    ) {
        let Some(position) = self.book.get(&meta.id) else {
            return;
        };
        let order = Order::new(
            meta.id.clone(),
            position.side.exit_direction(),
            quantity.min(position.abs_quantity()),
            price,
            position.category.clone(),
        );
        let Some(fill) = self.submit(order).await else {
            return;
        };

        self.account.cash += fill.cash_delta();
        if let Some(slice) = self
            .book
            .reduce(&meta.id, &fill, CloseReason::PartialTakeProfit)
        {
            tracing::info!(
                target: "trades",
                action = "PARTIAL_CLOSE",
                instrument = %meta.id,
                direction = %fill.direction,
                quantity = %fill.quantity,
                price = %fill.price,
                %fraction,
                reason = %CloseReason::PartialTakeProfit,
                realized_pnl = %slice.realized_pnl,
                "Partial profit taken"
            );
            record_close(CloseReason::PartialTakeProfit);
            report.partial_closes.push(meta.id.clone());
            self.notifier
                .notify(
                    Severity::Info,
                    &format!(
                        "Took partial profit on {} x{} @ {}, P&L {}",
                        meta.id,
                        fill.quantity,
                        fill.price,
                        slice.realized_pnl.round_dp(2)
                    ),
                )
                .await;
        }
        self.refresh_equity();
    }

    async fn scale_in(&mut self, meta: &InstrumentMeta, quantity: Decimal, price: Decimal) {
        let Some(position) = self.book.get(&meta.id) else {
            return;
        };
        let direction = position.side.entry_direction();
        let Some(cost) = self.order_cost(meta, quantity, price) else {
            return;
        };
        if self.account.cash < cost {
            tracing::debug!(instrument = %meta.id, %cost, "Not enough cash to pyramid");
            return;
        }

        let order = Order::new(meta.id.clone(), direction, quantity, price, meta.category.clone());
        let Some(fill) = self.submit(order).await else {
            return;
        };

        self.account.cash += fill.cash_delta();
        if let Some(position) = self.book.scale_in(&meta.id, &fill) {
            tracing::info!(
                target: "trades",
                action = "SCALE_IN",
                instrument = %meta.id,
                direction = %fill.direction,
                quantity = %fill.quantity,
                price = %fill.price,
                steps = position.pyramid_steps,
                entry_price = %position.entry_price,
                "Added to winning position"
            );
        }
        self.refresh_equity();
    }

    /// Close everything left after a halt
    async fn flatten(&mut self, instruments: &[InstrumentMeta], report: &mut CycleReport) {
        let open: Vec<String> = self.book.iter().map(|p| p.instrument.clone()).collect();
        for id in open {
            let Some(&price) = self.marks.get(&id) else {
                tracing::error!(instrument = %id, "No price to flatten position");
                continue;
            };
            if !instruments.iter().any(|m| m.id == id) {
                tracing::warn!(instrument = %id, "Flattening position outside the instrument list");
            }
            self.close_position(&id, CloseReason::CriticalStop, price, report)
                .await;
        }
    }
}
