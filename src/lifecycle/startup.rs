//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Start the config watcher and signal handler
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{load_config, ConfigError, GatewayConfig};
use crate::config::watcher::ConfigWatcher;
use crate::http::server::{GatewayServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{init_logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run the gateway from a config file until a termination signal arrives.
pub async fn run_from_file(path: &Path) -> Result<(), StartupError> {
    let config = load_config(path)?;
    init_logging(&config.observability);
    tracing::info!(path = %path.display(), routes = config.routes.len(), "Configuration loaded");

    let (watcher, updates) = ConfigWatcher::new(path);
    // The watcher stops when dropped; keep it for the lifetime of the server.
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            None
        }
    };

    run(config, updates).await
}

/// Run the gateway with `config`, applying later configs sent on `updates`.
pub async fn run(
    config: GatewayConfig,
    updates: mpsc::UnboundedReceiver<GatewayConfig>,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = config.listener.bind_address.clone();
    let server = GatewayServer::new(config)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address: address.clone(), source })?;
    tracing::info!(address = %address, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, updates, shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
