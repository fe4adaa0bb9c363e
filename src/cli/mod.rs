//! CLI interface for trade-engine
//!
//! Provides subcommands for:
//! - `run`: Paper trade over CSV bar files
//! - `config`: Print the effective configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trade-engine")]
#[command(about = "Signal-driven trading engine with ATR risk management")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start paper trading
    Run(RunArgs),
    /// Show the effective configuration
    Config {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::parse_from([
            "trade-engine",
            "--config",
            "custom.toml",
            "run",
            "--data-dir",
            "bars",
            "--cycles",
            "2",
        ]);
        assert_eq!(cli.config, "custom.toml");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.data_dir, std::path::PathBuf::from("bars"));
                assert_eq!(args.cycles, Some(2));
                assert_eq!(args.category, "stocks");
            }
            Commands::Config { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_config_is_default_path() {
        let cli = Cli::parse_from(["trade-engine", "config", "--json"]);
        assert_eq!(cli.config, "config.toml");
        assert!(matches!(cli.command, Commands::Config { json: true }));
    }
}
