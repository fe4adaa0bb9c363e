//! CSV feed, paper executor and account loop together

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use trade_engine::commission::CommissionSchedule;
use trade_engine::config::Config;
use trade_engine::engine::{AccountLoop, Collaborators};
use trade_engine::execution::PaperExecutor;
use trade_engine::feed::CsvFeed;
use trade_engine::notify::LogNotifier;
use trade_engine::signal::{Classifier, LinearClassifier};

fn end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 15, 0, 0).unwrap()
}

fn write_trend(dir: &Path, id: &str, first: f64, step: f64) {
    let mut file = std::fs::File::create(dir.join(format!("{id}.csv"))).unwrap();
    writeln!(file, "time,open,high,low,close,volume").unwrap();
    for i in 0..48 {
        let close = first + step * i as f64;
        let time = end() - Duration::hours(47 - i);
        writeln!(
            file,
            "{},{},{},{},{},{}",
            time.to_rfc3339(),
            close - step / 2.0,
            close + 0.5,
            close - 0.5,
            close,
            1000
        )
        .unwrap();
    }
}

fn example_config() -> Config {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
    let mut config = Config::load(path).unwrap();
    config.retry.initial_delay_ms = 0;
    config
}

fn build(config: &Config, dir: &Path) -> (AccountLoop, Arc<PaperExecutor>) {
    let executor = Arc::new(PaperExecutor::new(CommissionSchedule::from_config(
        &config.commission,
    )));
    let classifier: Arc<dyn Classifier> = Arc::new(
        LinearClassifier::from_config(config.classifier.as_ref().unwrap()).unwrap(),
    );
    let engine = AccountLoop::new(
        config,
        Collaborators {
            feed: Arc::new(CsvFeed::new(dir, "stocks")),
            executor: executor.clone(),
            notifier: Arc::new(LogNotifier),
            classifier: Some(classifier),
        },
    );
    (engine, executor)
}

#[tokio::test]
async fn test_cycle_over_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    write_trend(dir.path(), "GAZP", 100.0, 0.5);
    write_trend(dir.path(), "GMKN", 150.0, -0.5);
    let config = example_config();
    let (mut engine, executor) = build(&config, dir.path());

    let report = engine.run_cycle(end()).await;

    assert_eq!(report.evaluated, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(engine.book().len(), report.opened.len());
    assert_eq!(executor.fills().await.len(), report.opened.len());
    assert!(engine.account().active);
    for (id, _) in &report.opened {
        assert!(engine.marks().contains_key(id));
    }
}

#[tokio::test]
async fn test_malformed_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_trend(dir.path(), "GAZP", 100.0, 0.5);
    std::fs::write(
        dir.path().join("BROKEN.csv"),
        "time,open,high,low,close,volume\nyesterday,1,2,0,1,5\n",
    )
    .unwrap();
    let (mut engine, _) = build(&example_config(), dir.path());

    let report = engine.run_cycle(end()).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.evaluated, 1);
    assert!(!engine.book().contains("BROKEN"));
}

#[tokio::test]
async fn test_bars_outside_history_window_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_trend(dir.path(), "GAZP", 100.0, 0.5);
    let (mut engine, executor) = build(&example_config(), dir.path());

    let report = engine.run_cycle(end() + Duration::days(60)).await;

    assert_eq!(report.skipped, 1);
    assert!(executor.fills().await.is_empty());
}
