//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatcher as fallback and the docs endpoint
//! - Wire up middleware (tracing, timeouts, body limit, request ID)
//! - Bind server to listener
//! - Buffer each request and hand it to the dispatcher on a blocking worker

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::dispatch::{Dispatcher, UNEXPECTED_FAILURE};
use crate::http::docs;
use crate::http::request::{IncomingRequest, X_REQUEST_ID};
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub mount_path: Arc<str>,
    pub max_body_size: usize,
}

/// HTTP server exposing a route table.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving `table` with the given configuration.
    pub fn new(config: ServerConfig, table: RouteTable) -> Self {
        let state = AppState {
            dispatcher: Arc::new(Dispatcher::new(Arc::new(table))),
            mount_path: Arc::from(config.dispatch.mount_path.trim_end_matches('/')),
            max_body_size: config.limits.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let mut router = Router::new().fallback(dispatch_handler).with_state(state);
        if config.docs.enabled {
            router = router.merge(docs::router(&config.docs));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                // The limit layer's body has no `Default`, so it must sit outside the timeout.
                .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// The fully layered router, for serving it elsewhere.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount_path = %self.config.dispatch.mount_path,
            "HTTP server starting"
        );

        // Serve with graceful shutdown
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Main dispatch handler.
/// Strips the mount path, buffers the body and runs the dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let Some(path) = strip_mount(&state.mount_path, parts.uri.path()) else {
        tracing::debug!(path = %parts.uri.path(), "Outside the dispatch mount path");
        return StatusCode::NOT_FOUND.into_response();
    };
    let target = match parts.uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Request body could not be read").into_response();
        }
    };

    let request = IncomingRequest::from_parts(parts.method, &target, parts.headers, body)
        .read_multipart()
        .await;

    let dispatcher = Arc::clone(&state.dispatcher);
    match tokio::task::spawn_blocking(move || dispatcher.dispatch(&request)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch worker failed");
            (StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED_FAILURE).into_response()
        }
    }
}

/// The request path relative to `mount`, or `None` when it lies outside.
/// `mount` carries no trailing slash; the empty mount is the root.
fn strip_mount<'a>(mount: &str, path: &'a str) -> Option<&'a str> {
    if mount.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BasicType, Param};
    use crate::dispatch::Reply;
    use crate::routing::{Route, Service};

    async fn serve(config: ServerConfig) -> (String, broadcast::Sender<()>) {
        let table = RouteTable::builder()
            .service(Service::new("/test").route(
                Route::post("/invoke")
                    .produces(mime::TEXT_PLAIN)
                    .param(Param::body(BasicType::Text))
                    .handler(|call| {
                        let sql: String = call.arg(0)?;
                        Ok(Reply::text(sql))
                    }),
            ))
            .build()
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);
        tokio::spawn(HttpServer::new(config, table).run(listener, rx));
        (format!("http://{addr}/test/invoke"), tx)
    }

    #[tokio::test]
    async fn test_layered_router_serves_and_limits_body() {
        let mut config = ServerConfig::default();
        config.limits.max_body_size = 8;
        let (url, shutdown) = serve(config).await;
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .unwrap();

        let ok = client
            .post(&url)
            .header("content-type", "text/plain")
            .body("SELECT 1")
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), reqwest::StatusCode::OK);
        assert!(ok.headers().get(X_REQUEST_ID).is_some());
        assert_eq!(ok.text().await.unwrap(), "SELECT 1");

        let too_big = client
            .post(&url)
            .header("content-type", "text/plain")
            .body("SELECT 12345")
            .send()
            .await
            .unwrap();
        assert_eq!(too_big.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);

        let _ = shutdown.send(());
    }

    #[test]
    fn test_strip_mount() {
        assert_eq!(strip_mount("", "/test/invoke"), Some("/test/invoke"));
        assert_eq!(strip_mount("/api", "/api/test/invoke"), Some("/test/invoke"));
        assert_eq!(strip_mount("/api", "/api"), Some("/"));
        assert_eq!(strip_mount("/api", "/apix/test"), None);
        assert_eq!(strip_mount("/api", "/other"), None);
    }
}
