//! Credit Risk Server - Main Entry Point
//!
//! Loads the classifier artifact, then serves the prediction form.
//! Usage: `credit-risk-server [config.toml]` (default `config/config.toml`).

use anyhow::Result;
use credit_risk_server::config::{AppConfig, DEFAULT_CONFIG_PATH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config)?;

    info!(
        config = config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH),
        "Starting Credit Risk Server"
    );
    info!(
        "Risk levels: medium>={:.2}, high>={:.2}, critical>={:.2}",
        config.risk_levels.medium, config.risk_levels.high, config.risk_levels.critical
    );

    credit_risk_server::server::run(config).await
}

fn init_logging(config: &AppConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level())?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
    Ok(())
}
