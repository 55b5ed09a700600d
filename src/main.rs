//! RPC dispatch server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌────────────────────────────────────────────────────┐
//!     ───────────────────┼─▶ http server ──▶ IncomingRequest ──▶ dispatcher    │
//!                        │   (axum, layers)  (body, multipart)   │             │
//!                        │                                       ▼             │
//!                        │                              route table lookup     │
//!                        │                              binders → handler      │
//!     Client Response    │                                       │             │
//!     ◀──────────────────┼── OutgoingResponse ◀── encoder ◀──────┘             │
//!                        │                                                     │
//!                        │   config · observability · lifecycle                │
//!                        └────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use rpc_dispatch::config::{load_config, ServerConfig};
use rpc_dispatch::lifecycle::{self, signals, Shutdown};
use rpc_dispatch::observability::logging;

#[derive(Parser)]
#[command(name = "rpc-dispatch")]
#[command(about = "Serve RPC-style services over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("rpc-dispatch v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mount_path = %config.dispatch.mount_path,
        route_matching = ?config.dispatch.route_matching,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(Arc::clone(&shutdown));

    lifecycle::run(config, rpc_dispatch::demo::services(), shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
