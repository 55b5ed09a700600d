//! Shared utilities for integration tests.

use std::sync::Arc;
use tokio::net::TcpListener;

use rpc_dispatch::config::ServerConfig;
use rpc_dispatch::lifecycle::{build_table, Shutdown};
use rpc_dispatch::routing::Service;
use rpc_dispatch::HttpServer;

/// A server running on an ephemeral port. Stops when dropped.
pub struct TestServer {
    pub base_url: String,
    shutdown: Arc<Shutdown>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a server with default config.
#[allow(dead_code)]
pub async fn spawn_server(services: Vec<Service>) -> TestServer {
    spawn_server_with(ServerConfig::default(), services).await
}

/// Start a server with `config`; the bind address is always `127.0.0.1:0`.
pub async fn spawn_server_with(config: ServerConfig, services: Vec<Service>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let table = build_table(&config.dispatch, services).unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, table);
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestServer {
        base_url: format!("http://{addr}"),
        shutdown,
    }
}

/// HTTP client without connection pooling, so servers can shut down promptly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
