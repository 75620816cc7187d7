//! Main entry point for the fieldcheck demo server

use anyhow::Result;
use fieldcheck_core::{config::LoggingConfig, create_app, run_server, AppConfig, AppState};
use std::{net::SocketAddr, time::Duration};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_tracing(&config.logging);

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::from_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to load validation schema: {}", e))?;

    info!("App: {} v{}", state.app_name, state.version);
    info!(
        "Default locations: {:?}, body limit: {} bytes",
        state.config.validation.default_locations,
        state.config.validation.max_body_bytes
    );

    let app = create_app(state);

    run_server(app, addr, shutdown_timeout).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            format!(
                "{}={},fieldcheck_core={},tower_http=debug",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                logging.level,
                logging.level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(logging.format == "json");

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
