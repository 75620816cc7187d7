//! Request field validation chains for axum, plus the demo server built on them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod validation;

pub use crate::config::AppConfig;
pub use error::{AppError, Result};
pub use handlers::routes::{create_routes, signup_chains};
pub use middleware::logging::logging_layer;
pub use validation::{
    body, check, check_chains, check_schema, cookies, headers, params, query, Chain, ChainSet,
    Checked, Location, RequestData, Schema, ValidationError,
};

use axum::Router;
use std::future::IntoFuture;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{signal, sync::oneshot};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    /// Chains compiled from the configured schema, served on `/api/validate`.
    pub chains: ChainSet,
    pub config: Arc<AppConfig>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default(), Vec::new())
    }
}

impl AppState {
    pub fn new(config: AppConfig, chains: Vec<Chain>) -> Self {
        let chains = ChainSet::new(chains).with_body_limit(config.validation.max_body_bytes);

        Self {
            app_name: "fieldcheck".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            chains,
            config: Arc::new(config),
        }
    }

    /// Builds the state from configuration, compiling the schema file when
    /// one is configured.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let chains = match &config.validation.schema_path {
            Some(path) => {
                let schema = Schema::load(path)?;
                let chains = check_schema(&schema, &config.validation.default_locations);
                info!("Loaded {} schema chains from {}", chains.len(), path.display());
                chains
            }
            None => {
                info!("No validation schema configured");
                Vec::new()
            }
        };

        Ok(Self::new(config, chains))
    }

    pub fn with_chains(mut self, chains: Vec<Chain>) -> Self {
        self.chains = ChainSet::new(chains).with_body_limit(self.config.validation.max_body_bytes);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(create_routes(&state))
        .layer(logging_layer())
        .with_state(state)
}

/// Serves `app` until Ctrl+C or SIGTERM, then gives in-flight requests up to
/// `shutdown_timeout` to finish.
pub async fn run_server(app: Router, addr: SocketAddr, shutdown_timeout: Duration) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let (signalled_tx, signalled_rx) = oneshot::channel();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    let deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(shutdown_timeout).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => {
            warn!("Graceful shutdown timed out after {:?}", shutdown_timeout);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
