//! Retry with exponential backoff for external calls

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Attempts, first delay and growth factor for retried calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_delay: Duration, backoff_factor: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay,
            backoff_factor: backoff_factor.max(1),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.attempts,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_factor,
        )
    }

    /// Delay slept after failed attempt number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.backoff_factor.saturating_pow(attempt))
    }

    /// Run `op` until it succeeds or attempts run out; returns the last error
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.attempts {
                        tracing::error!(
                            op = op_name,
                            attempts = attempt,
                            error = %e,
                            "Retries exhausted"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt - 1);
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
