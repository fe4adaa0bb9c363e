//! Account loop
//!
//! Polls market data, turns it into signals and carries out the risk
//! manager's instructions for one account.

mod account_loop;

pub use account_loop::{AccountLoop, Collaborators, CycleReport};
