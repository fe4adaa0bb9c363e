use anyhow::Context;
use clap::Parser;
use trade_engine::cli::{Cli, Commands};
use trade_engine::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {:#}", cli.config, e);
            eprintln!("Using default configuration");
            let config: Config = toml::from_str(include_str!("../config.toml.example"))
                .context("Invalid default config")?;
            config.validate()?;
            config
        }
    };

    let _telemetry = trade_engine::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => args.execute(&config).await?,
        Commands::Config { json: true } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Config { json: false } => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
