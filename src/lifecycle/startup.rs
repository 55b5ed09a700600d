//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the route table from the registered services
//! - Initialize metrics when enabled
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use super::Shutdown;
use crate::config::{ConfigError, DispatchConfig, ServerConfig};
use crate::error::BuildError;
use crate::http::HttpServer;
use crate::observability::metrics;
use crate::routing::{RouteTable, Service};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("route table: {0}")]
    Routes(#[from] BuildError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the route table the way `dispatch` configures it.
pub fn build_table(
    config: &DispatchConfig,
    services: Vec<Service>,
) -> Result<RouteTable, BuildError> {
    let table = RouteTable::builder()
        .matching(config.route_matching)
        .allow_override(config.allow_route_override)
        .services(services)
        .build()?;

    for key in table.routes() {
        tracing::info!(route = %key, "Route available");
    }
    Ok(table)
}

/// Bring the server up and serve until `shutdown` fires.
pub async fn run(
    config: ServerConfig,
    services: Vec<Service>,
    shutdown: Arc<Shutdown>,
) -> Result<(), StartupError> {
    let table = build_table(&config.dispatch, services)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        routes = table.len(),
        "Listening for connections"
    );

    let server = HttpServer::new(config, table);
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
