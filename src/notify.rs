//! Operator notifications
//!
//! Fire-and-forget messages about closes, halts and degraded operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    /// Trading halted or needs attention
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        })
    }
}

/// Trait for notification sinks. Delivery failures are the sink's problem.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, message: &str);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "notify", %severity, "{message}"),
            Severity::Warning => tracing::warn!(target: "notify", %severity, "{message}"),
            Severity::Critical => tracing::error!(target: "notify", %severity, "{message}"),
        }
    }
}
