//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate the descriptor, build the first deployment
//! - Initialize logging and metrics
//! - Start the descriptor watcher and the signal listener
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when the deployment is built)

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_config, ConfigError, ConfigWatcher};
use crate::deployment::{build_deployment, DeploymentHandle};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{init_logging, init_metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start descriptor watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serve the application described by the file at `path` until a shutdown signal.
pub async fn serve(path: &Path) -> Result<(), StartupError> {
    let config = load_config(path)?;
    init_logging(&config.observability);
    tracing::info!(application = %config.name, descriptor = ?path, "webapp-router starting");

    let deployment = build_deployment(&config).map_err(ConfigError::from)?;
    let handle = DeploymentHandle::new(deployment);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let _watcher = if config.server.watch {
        Some(ConfigWatcher::new(path, handle.clone()).run()?)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_secs = config.server.request_timeout_secs,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    HttpServer::new(&config.server, handle)
        .run(listener, &shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
