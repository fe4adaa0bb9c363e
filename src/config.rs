//! Configuration types for trade-engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
}

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A value is outside its allowed range
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    /// Commission schedule has no entry for its default category
    #[error("Commission schedule has no entry for default category {0:?}")]
    MissingDefaultCommission(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Trading account configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    /// Account identifier used in logs
    pub id: String,
    /// Starting cash balance
    pub initial_balance: Decimal,
    /// Leverage multiplier applied to volatility sizing
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
    /// Fraction of equity risked per trade
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: Decimal,
    /// Soft daily loss limit as a fraction of start-of-day balance
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: Decimal,
}

fn default_leverage() -> Decimal {
    Decimal::new(3, 0)
}
fn default_risk_per_trade() -> Decimal {
    Decimal::new(2, 2) // 0.02 = 2%
}
fn default_daily_loss_limit() -> Decimal {
    Decimal::new(10, 2) // 0.10 = 10%
}

/// Position risk parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskConfig {
    /// Bars in the ATR lookback
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// Initial stop distance in ATRs
    #[serde(default = "default_stop_atr_multiplier")]
    pub stop_atr_multiplier: Decimal,

    /// Base take-profit distance in ATRs
    #[serde(default = "default_take_profit_atr_multiplier")]
    pub take_profit_atr_multiplier: Decimal,

    /// Trailing stop distance in ATRs
    #[serde(default = "default_trailing_step_atr")]
    pub trailing_step_atr: Decimal,

    /// Positions older than this are closed unless profitable enough
    #[serde(default = "default_max_position_duration_hours")]
    pub max_position_duration_hours: u64,

    /// Profit fraction a timed-out position must exceed to stay open
    #[serde(default = "default_min_timeout_profit")]
    pub min_timeout_profit: Decimal,

    /// Daily loss fraction that halts the account
    #[serde(default = "default_critical_loss_pct")]
    pub critical_loss_pct: Decimal,

    #[serde(default)]
    pub partial_take_profit: PartialTakeProfitConfig,

    #[serde(default)]
    pub pyramiding: PyramidingConfig,
}

fn default_atr_period() -> usize {
    14
}
fn default_stop_atr_multiplier() -> Decimal {
    Decimal::new(15, 1) // 1.5
}
fn default_take_profit_atr_multiplier() -> Decimal {
    Decimal::new(3, 0)
}
fn default_trailing_step_atr() -> Decimal {
    Decimal::new(5, 1) // 0.5
}
fn default_max_position_duration_hours() -> u64 {
    3
}
fn default_min_timeout_profit() -> Decimal {
    Decimal::new(2, 3) // 0.002 = 0.2%
}
fn default_critical_loss_pct() -> Decimal {
    Decimal::new(30, 2) // 0.30 = 30%
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            atr_period: default_atr_period(),
            stop_atr_multiplier: default_stop_atr_multiplier(),
            take_profit_atr_multiplier: default_take_profit_atr_multiplier(),
            trailing_step_atr: default_trailing_step_atr(),
            max_position_duration_hours: default_max_position_duration_hours(),
            min_timeout_profit: default_min_timeout_profit(),
            critical_loss_pct: default_critical_loss_pct(),
            partial_take_profit: PartialTakeProfitConfig::default(),
            pyramiding: PyramidingConfig::default(),
        }
    }
}

/// Two-stage profit taking
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartialTakeProfitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Profit fraction that closes `ratio` of the position (once)
    #[serde(default = "default_first_threshold")]
    pub first_threshold: Decimal,
    /// Profit fraction that closes the remainder
    #[serde(default = "default_second_threshold")]
    pub second_threshold: Decimal,
    /// Share of the position closed at the first threshold
    #[serde(default = "default_partial_ratio")]
    pub ratio: Decimal,
}

fn default_true() -> bool {
    true
}
fn default_first_threshold() -> Decimal {
    Decimal::new(5, 3) // 0.5%
}
fn default_second_threshold() -> Decimal {
    Decimal::new(1, 2) // 1%
}
fn default_partial_ratio() -> Decimal {
    Decimal::new(5, 1) // 50%
}

impl Default for PartialTakeProfitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_threshold: default_first_threshold(),
            second_threshold: default_second_threshold(),
            ratio: default_partial_ratio(),
        }
    }
}

/// Scaling into winning positions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PyramidingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Profit fraction from entry required before adding
    #[serde(default = "default_profit_increment")]
    pub profit_increment: Decimal,
    /// Extra take-profit ATRs per pyramid step
    #[serde(default = "default_step_increment")]
    pub step_increment: Decimal,
    /// Upper bound on the extra take-profit ATRs
    #[serde(default = "default_step_cap")]
    pub step_cap: Decimal,
    /// Maximum number of add-ons per position
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Confidence fed to cash-capped sizing for add-ons
    #[serde(default = "default_pyramid_confidence")]
    pub confidence: Decimal,
}

fn default_profit_increment() -> Decimal {
    Decimal::new(5, 3) // 0.5%
}
fn default_step_increment() -> Decimal {
    Decimal::new(5, 1) // 0.5 ATR
}
fn default_step_cap() -> Decimal {
    Decimal::new(2, 0) // 2 ATR
}
fn default_max_steps() -> u32 {
    3
}
fn default_pyramid_confidence() -> Decimal {
    Decimal::new(5, 1)
}

impl Default for PyramidingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            profit_increment: default_profit_increment(),
            step_increment: default_step_increment(),
            step_cap: default_step_cap(),
            max_steps: default_max_steps(),
            confidence: default_pyramid_confidence(),
        }
    }
}

/// Oscillator parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    /// Bars averaged for the recent-range feature
    #[serde(default = "default_feature_window")]
    pub feature_window: usize,
}

fn default_rsi_period() -> usize {
    14
}
fn default_rsi_overbought() -> f64 {
    65.0
}
fn default_rsi_oversold() -> f64 {
    35.0
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_feature_window() -> usize {
    14
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            rsi_overbought: default_rsi_overbought(),
            rsi_oversold: default_rsi_oversold(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            feature_window: default_feature_window(),
        }
    }
}

/// How indicator votes and the classifier combine
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalPolicy {
    /// Trade only when the classifier agrees with an indicator vote
    #[default]
    Strict,
    /// Trade on indicator votes alone; the classifier only breaks ties
    Permissive,
}

/// Signal engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalConfig {
    #[serde(default)]
    pub policy: SignalPolicy,
    /// Fewer bars than this always yields no signal
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,
    /// Minimum confidence for an opposite signal to reverse an open position
    #[serde(default = "default_reversal_confidence")]
    pub reversal_confidence: Decimal,
}

fn default_min_bars() -> usize {
    30
}
fn default_reversal_confidence() -> Decimal {
    Decimal::new(6, 1) // 0.6
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            policy: SignalPolicy::Strict,
            min_bars: default_min_bars(),
            reversal_confidence: default_reversal_confidence(),
        }
    }
}

/// Position sizing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SizingConfig {
    /// Share of free cash never allocated by cash-capped sizing
    #[serde(default = "default_cash_reserve_pct")]
    pub cash_reserve_pct: Decimal,
}

fn default_cash_reserve_pct() -> Decimal {
    Decimal::new(5, 2) // 5%
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            cash_reserve_pct: default_cash_reserve_pct(),
        }
    }
}

/// Fee for one commission category
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct CommissionRate {
    /// Proportional fee on order value
    pub rate: Decimal,
    /// Flat fee per order
    pub fixed: Decimal,
}

/// Commission schedule configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommissionConfig {
    /// Lowest fee ever charged
    #[serde(default = "default_min_fee")]
    pub min_fee: Decimal,
    /// Category used for instruments without their own entry
    #[serde(default = "default_commission_category")]
    pub default_category: String,
    #[serde(default = "default_commission_categories")]
    pub categories: HashMap<String, CommissionRate>,
}

fn default_min_fee() -> Decimal {
    Decimal::new(1, 2) // 0.01
}
fn default_commission_category() -> String {
    "default".to_string()
}
fn default_commission_categories() -> HashMap<String, CommissionRate> {
    let entry = |rate: Decimal, fixed: Decimal| CommissionRate { rate, fixed };
    HashMap::from([
        ("stocks".to_string(), entry(Decimal::new(5, 4), Decimal::new(1, 2))),
        ("precious_metals".to_string(), entry(Decimal::new(15, 3), Decimal::new(1, 2))),
        ("currency".to_string(), entry(Decimal::new(5, 3), Decimal::new(1, 2))),
        ("default".to_string(), entry(Decimal::new(1, 3), Decimal::new(5, 0))),
    ])
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            min_fee: default_min_fee(),
            default_category: default_commission_category(),
            categories: default_commission_categories(),
        }
    }
}

/// Retry policy for external calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
}

fn default_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_backoff_factor() -> u32 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Account loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Sleep between cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Price history requested per instrument per cycle
    #[serde(default = "default_history_hours")]
    pub history_hours: i64,
}

fn default_poll_interval_secs() -> u64 {
    60
}
fn default_history_hours() -> i64 {
    30 * 24
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            history_hours: default_history_hours(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json_logs: bool,
    /// Serve Prometheus metrics on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_port: None,
        }
    }
}

/// Logistic classifier coefficients
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// One weight per feature, in feature order
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    /// Probabilities within this distance of 0.5 predict SKIP
    #[serde(default)]
    pub skip_band: f64,
}

/// Upper bound for hour-valued settings (100 years)
const MAX_HOURS: i64 = 100 * 365 * 24;

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let one = Decimal::ONE;
        let account = &self.account;
        if account.initial_balance < Decimal::ZERO {
            return Err(invalid("account.initial_balance", "must not be negative"));
        }
        if account.leverage <= Decimal::ZERO {
            return Err(invalid("account.leverage", "must be positive"));
        }
        if account.risk_per_trade <= Decimal::ZERO || account.risk_per_trade >= one {
            return Err(invalid("account.risk_per_trade", "must be in (0, 1)"));
        }
        if account.daily_loss_limit <= Decimal::ZERO {
            return Err(invalid("account.daily_loss_limit", "must be positive"));
        }
        if self.risk.critical_loss_pct <= account.daily_loss_limit {
            return Err(invalid(
                "risk.critical_loss_pct",
                "must be stricter than account.daily_loss_limit",
            ));
        }
        if self.risk.atr_period == 0 {
            return Err(invalid("risk.atr_period", "must be at least 1"));
        }

        let partial = &self.risk.partial_take_profit;
        if partial.first_threshold >= partial.second_threshold {
            return Err(invalid(
                "risk.partial_take_profit",
                "first_threshold must be below second_threshold",
            ));
        }
        if partial.ratio <= Decimal::ZERO || partial.ratio >= one {
            return Err(invalid("risk.partial_take_profit.ratio", "must be in (0, 1)"));
        }

        let pyramid = &self.risk.pyramiding;
        if pyramid.confidence < Decimal::ZERO || pyramid.confidence > one {
            return Err(invalid("risk.pyramiding.confidence", "must be in [0, 1]"));
        }

        let ind = &self.indicators;
        if ind.rsi_period == 0 {
            return Err(invalid("indicators.rsi_period", "must be at least 1"));
        }
        if ind.rsi_oversold >= ind.rsi_overbought {
            return Err(invalid(
                "indicators.rsi_oversold",
                "must be below rsi_overbought",
            ));
        }
        if ind.macd_fast == 0 || ind.macd_fast >= ind.macd_slow {
            return Err(invalid("indicators.macd_fast", "must be in [1, macd_slow)"));
        }

        if self.sizing.cash_reserve_pct < Decimal::ZERO || self.sizing.cash_reserve_pct >= one {
            return Err(invalid("sizing.cash_reserve_pct", "must be in [0, 1)"));
        }

        let commission = &self.commission;
        if commission.min_fee <= Decimal::ZERO {
            return Err(invalid("commission.min_fee", "must be positive"));
        }
        if !commission.categories.contains_key(&commission.default_category) {
            return Err(ConfigError::MissingDefaultCommission(
                commission.default_category.clone(),
            ));
        }
        if commission
            .categories
            .values()
            .any(|c| c.rate < Decimal::ZERO || c.fixed < Decimal::ZERO)
        {
            return Err(invalid("commission.categories", "rates and fees must not be negative"));
        }

        if self.risk.max_position_duration_hours == 0
            || self.risk.max_position_duration_hours > MAX_HOURS as u64
        {
            return Err(invalid(
                "risk.max_position_duration_hours",
                format!("must be in [1, {MAX_HOURS}]"),
            ));
        }
        if self.engine.history_hours <= 0 || self.engine.history_hours > MAX_HOURS {
            return Err(invalid(
                "engine.history_hours",
                format!("must be in [1, {MAX_HOURS}]"),
            ));
        }

        if self.retry.attempts == 0 {
            return Err(invalid("retry.attempts", "must be at least 1"));
        }
        if self.retry.backoff_factor == 0 {
            return Err(invalid("retry.backoff_factor", "must be at least 1"));
        }

        if let Some(classifier) = &self.classifier {
            if classifier.weights.len() != crate::signal::FEATURE_COUNT {
                return Err(invalid(
                    "classifier.weights",
                    format!("expected {} weights", crate::signal::FEATURE_COUNT),
                ));
            }
        }

        Ok(())
    }
}
