//! Configuration loading from disk

use std::io::Write;
use std::path::Path;
use trade_engine::config::{Config, SignalPolicy};

#[test]
fn test_example_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.account.id, "paper-1");
    assert_eq!(config.signal.policy, SignalPolicy::Strict);
    assert_eq!(config.classifier.unwrap().weights.len(), 7);
    assert!(config.commission.categories.contains_key("default"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [account]
        id = "bad"
        initial_balance = 1000
        daily_loss_limit = 0.5

        [risk]
        critical_loss_pct = 0.3

        [telemetry]
        log_level = "info"
        "#
    )
    .unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("critical_loss_pct"));
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::load("/nonexistent/trade-engine.toml").is_err());
}
