//! fxbot - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Webhook-driven signal trading agent
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FXBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI arg > FXBOT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("FXBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = fxbot_bot::AppConfig::load(&config_path)?;

    fxbot_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting fxbot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = %config_path,
        found = std::path::Path::new(&config_path).exists(),
        broker = ?config.broker.kind,
        threshold = %config.trading.loss_cut_threshold,
        "Configuration loaded"
    );

    let app = fxbot_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
