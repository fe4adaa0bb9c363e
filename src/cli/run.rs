//! Run command implementation

use crate::commission::CommissionSchedule;
use crate::config::Config;
use crate::engine::{AccountLoop, Collaborators};
use crate::execution::PaperExecutor;
use crate::feed::CsvFeed;
use crate::notify::LogNotifier;
use crate::signal::{Classifier, LinearClassifier};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory with one `<instrument>.csv` bar file per instrument
    #[arg(short, long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Stop after this many cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Commission category applied to every instrument
    #[arg(long, default_value = "stocks")]
    pub category: String,

    /// Override the poll interval from the config (seconds)
    #[arg(long)]
    pub interval: Option<u64>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let classifier: Option<Arc<dyn Classifier>> = match &config.classifier {
            Some(cfg) => Some(Arc::new(LinearClassifier::from_config(cfg)?)),
            None => None,
        };
        let collaborators = Collaborators {
            feed: Arc::new(CsvFeed::new(&self.data_dir, self.category.clone())),
            executor: Arc::new(PaperExecutor::new(CommissionSchedule::from_config(
                &config.commission,
            ))),
            notifier: Arc::new(LogNotifier),
            classifier,
        };

        let interval =
            Duration::from_secs(self.interval.unwrap_or(config.engine.poll_interval_secs));
        tracing::info!(
            account = %config.account.id,
            data_dir = %self.data_dir.display(),
            interval_secs = interval.as_secs(),
            policy = ?config.signal.policy,
            "Starting paper trading"
        );

        let mut account_loop = AccountLoop::new(config, collaborators);
        account_loop.run(interval, self.cycles).await;

        let account = account_loop.account();
        let book = account_loop.book();
        tracing::info!(
            cash = %account.cash,
            equity = %account.equity,
            open_positions = book.len(),
            closed_trades = book.closed().len(),
            realized_pnl = %book.realized_pnl(),
            active = account.active,
            "Paper trading stopped"
        );
        Ok(())
    }
}
