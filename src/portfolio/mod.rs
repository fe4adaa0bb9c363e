//! Portfolio-level capital management

mod rebalancer;

pub use rebalancer::Rebalancer;
