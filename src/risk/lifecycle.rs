//! Position lifecycle management
//!
//! One evaluation per position per cycle. Stop and target refresh come first,
//! then hard exits (timeout, loss breaker, stop-loss, take-profit), then
//! profit-taking, then pyramiding. The first exit found ends the evaluation.

use super::limits::{BreakerState, DailyLossBreaker};
use super::{Account, CloseReason, Position, PositionSizer, Side};
use crate::config::RiskConfig;
use crate::feed::InstrumentMeta;
use crate::notify::Severity;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fallback stop and target distance as a fraction of entry when ATR is unknown
const NO_ATR_OFFSET: Decimal = dec!(0.005);

/// Market state used for one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub atr: Decimal,
    pub now: DateTime<Utc>,
}

/// Instruction for the account loop
#[derive(Debug, Clone, PartialEq)]
pub enum PositionAction {
    /// Stop-loss moved (already applied to the position)
    UpdateStop(Decimal),
    /// Take-profit moved (already applied to the position)
    UpdateTarget(Decimal),
    /// Close the whole position
    Close(CloseReason),
    /// Close `quantity` units, `fraction` of the position
    PartialClose { fraction: Decimal, quantity: Decimal },
    /// Add `quantity` units on the same side
    ScaleIn(Decimal),
    Notify { severity: Severity, message: String },
}

/// Evaluates open positions against risk parameters
#[derive(Debug, Clone)]
pub struct PositionManager {
    risk: RiskConfig,
    breaker: DailyLossBreaker,
    sizer: PositionSizer,
}

impl PositionManager {
    pub fn new(risk: RiskConfig, sizer: PositionSizer) -> Self {
        Self {
            breaker: DailyLossBreaker::from_config(&risk),
            risk,
            sizer,
        }
    }

    pub fn breaker(&self) -> &DailyLossBreaker {
        &self.breaker
    }

    /// Stop and target for a fresh entry at `entry`
    pub fn initial_levels(&self, entry: Decimal, side: Side, atr: Decimal) -> (Decimal, Decimal) {
        let (stop_dist, target_dist) = if atr > Decimal::ZERO {
            (
                atr * self.risk.stop_atr_multiplier,
                atr * self.risk.take_profit_atr_multiplier,
            )
        } else {
            let offset = entry * NO_ATR_OFFSET;
            (offset, offset)
        };

        match side {
            Side::Long => (entry - stop_dist, entry + target_dist),
            Side::Short => (entry + stop_dist, entry - target_dist),
        }
    }

    /// Target distance in ATRs after `steps` add-ons
    fn target_multiplier(&self, steps: u32) -> Decimal {
        let pyramid = &self.risk.pyramiding;
        let extra = (Decimal::from(steps) * pyramid.step_increment).min(pyramid.step_cap);
        self.risk.take_profit_atr_multiplier + extra
    }

    fn trail_stop(&self, position: &mut Position, snapshot: &MarketSnapshot) -> Option<Decimal> {
        if snapshot.atr <= Decimal::ZERO {
            return None;
        }
        let distance = self.risk.trailing_step_atr * snapshot.atr;
        let moved = match position.side {
            Side::Long => {
                let candidate = snapshot.price - distance;
                (candidate > position.stop_loss).then_some(candidate)
            }
            Side::Short => {
                let candidate = snapshot.price + distance;
                (candidate < position.stop_loss).then_some(candidate)
            }
        }?;

        position.stop_loss = moved;
        position.trailing_stop = moved;
        Some(moved)
    }

    fn drift_target(&self, position: &mut Position, atr: Decimal) -> Option<Decimal> {
        if atr <= Decimal::ZERO {
            return None;
        }
        let distance = atr * self.target_multiplier(position.pyramid_steps);
        let target = match position.side {
            Side::Long => position.entry_price + distance,
            Side::Short => position.entry_price - distance,
        };
        if target == position.take_profit {
            return None;
        }
        position.take_profit = target;
        Some(target)
    }

    fn stop_hit(position: &Position, price: Decimal) -> bool {
        position.stop_loss > Decimal::ZERO
            && match position.side {
                Side::Long => price <= position.stop_loss,
                Side::Short => price >= position.stop_loss,
            }
    }

    fn target_hit(position: &Position, price: Decimal) -> bool {
        position.take_profit > Decimal::ZERO
            && match position.side {
                Side::Long => price >= position.take_profit,
                Side::Short => price <= position.take_profit,
            }
    }

    /// Evaluate one position and return the actions the loop should carry out.
    ///
    /// Stop and target updates are applied to `position` directly. A critical
    /// loss breach sets `account.active` to false. Partial-exit and pyramid
    /// bookkeeping are left to the position book once the order fills.
    pub fn evaluate_position(
        &self,
        account: &mut Account,
        position: &mut Position,
        meta: &InstrumentMeta,
        snapshot: MarketSnapshot,
    ) -> Vec<PositionAction> {
        let mut actions = Vec::new();
        let price = snapshot.price;

        if let Some(stop) = self.trail_stop(position, &snapshot) {
            actions.push(PositionAction::UpdateStop(stop));
        }
        if let Some(target) = self.drift_target(position, snapshot.atr) {
            actions.push(PositionAction::UpdateTarget(target));
        }

        let profit = position.profit_pct(price);

        let max_age = i64::try_from(self.risk.max_position_duration_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX);
        if position.age(snapshot.now) >= max_age && profit < self.risk.min_timeout_profit {
            actions.push(PositionAction::Close(CloseReason::TimeoutLowProfit));
            return actions;
        }

        match self.breaker.check(account) {
            BreakerState::CriticalBreach(loss_pct) => {
                account.active = false;
                tracing::error!(
                    account = %account.id,
                    instrument = %position.instrument,
                    reason = %CloseReason::CriticalStop,
                    %loss_pct,
                    "Critical loss threshold reached, halting account"
                );
                actions.push(PositionAction::Notify {
                    severity: Severity::Critical,
                    message: format!(
                        "Account {} halted: daily loss {:.2}% reached critical threshold {:.2}%",
                        account.id,
                        loss_pct * Decimal::ONE_HUNDRED,
                        self.breaker.critical_loss_pct * Decimal::ONE_HUNDRED
                    ),
                });
                actions.push(PositionAction::Close(CloseReason::CriticalStop));
                return actions;
            }
            BreakerState::SoftBreach(loss_pct) => {
                tracing::warn!(
                    account = %account.id,
                    instrument = %position.instrument,
                    %loss_pct,
                    "Daily loss limit reached"
                );
                actions.push(PositionAction::Close(CloseReason::DailyLossLimit));
                return actions;
            }
            BreakerState::Clear => {}
        }

        if Self::stop_hit(position, price) {
            actions.push(PositionAction::Close(CloseReason::StopLoss));
            return actions;
        }
        if Self::target_hit(position, price) {
            actions.push(PositionAction::Close(CloseReason::TakeProfit));
            return actions;
        }

        let partial = &self.risk.partial_take_profit;
        let mut taking_profit = false;
        if partial.enabled {
            let lot = if meta.lot > Decimal::ZERO { meta.lot } else { Decimal::ONE };
            let quantity = (position.abs_quantity() * partial.ratio / lot).floor() * lot;
            // A position too small to split skips straight to the second threshold
            if profit >= partial.first_threshold
                && !position.partial_taken
                && quantity > Decimal::ZERO
            {
                actions.push(PositionAction::PartialClose {
                    fraction: partial.ratio,
                    quantity,
                });
                taking_profit = true;
            } else if profit >= partial.second_threshold {
                actions.push(PositionAction::Close(CloseReason::PartialTakeProfit));
                return actions;
            }
        }

        let pyramid = &self.risk.pyramiding;
        if !taking_profit
            && pyramid.enabled
            && profit >= pyramid.profit_increment
            && position.pyramid_steps < pyramid.max_steps
        {
            let quantity =
                self.sizer
                    .size_scaled_position(meta, account.cash, price, pyramid.confidence);
            if quantity > Decimal::ZERO {
                actions.push(PositionAction::ScaleIn(quantity));
            }
        }

        actions
    }
}
