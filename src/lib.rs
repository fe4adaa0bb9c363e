//! trade-engine: signal-driven trading decisions with ATR-based risk management
//!
//! This library provides the core components for:
//! - Bar history from CSV files
//! - RSI, MACD and ATR indicators
//! - Signal voting with an optional classifier
//! - Volatility-scaled sizing and position lifecycle rules
//! - Daily loss circuit breakers
//! - Commission schedules and paper execution
//! - Cash-freeing rebalancing
//! - Logging and Prometheus metrics

pub mod cli;
pub mod commission;
pub mod config;
pub mod engine;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod notify;
pub mod portfolio;
pub mod retry;
pub mod risk;
pub mod signal;
pub mod telemetry;
