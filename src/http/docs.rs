//! Static documentation endpoint.
//!
//! Serves files below `docs.root` under `docs.mount_path`. `index.html` is a
//! template: `${host}`, `${port}` and `${ctxPath}` are replaced per request so
//! the page can point at the API it documents.

use axum::{
    extract::{Path as UrlPath, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::DocsConfig;

const INDEX: &str = "index.html";

#[derive(Clone)]
struct DocsState {
    root: Arc<PathBuf>,
    api_path: Arc<str>,
}

/// Router serving the documentation tree.
pub fn router(config: &DocsConfig) -> Router {
    let mount = config.mount_path.trim_end_matches('/');
    let state = DocsState {
        root: Arc::new(PathBuf::from(&config.root)),
        api_path: Arc::from(config.api_path.as_str()),
    };

    Router::new()
        .route(mount, get(index))
        .route(&format!("{mount}/"), get(index))
        .route(&format!("{mount}/{{*file}}"), get(file))
        .with_state(state)
}

async fn index(State(state): State<DocsState>, headers: HeaderMap) -> Response {
    serve(&state, INDEX, &headers).await
}

async fn file(
    State(state): State<DocsState>,
    UrlPath(file): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    serve(&state, &file, &headers).await
}

async fn serve(state: &DocsState, relative: &str, headers: &HeaderMap) -> Response {
    let Some(path) = resolve(&state.root, relative) else {
        tracing::debug!(file = %relative, "Rejected documentation path");
        return StatusCode::NOT_FOUND.into_response();
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Documentation file not readable");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let body = if path.file_name().is_some_and(|n| n == INDEX) {
        let (host, port) = host_and_port(headers);
        String::from_utf8_lossy(&bytes)
            .replace("${host}", &host)
            .replace("${port}", &port)
            .replace("${ctxPath}", &state.api_path)
            .into_bytes()
    } else {
        bytes
    };

    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type(&path)))],
        body,
    )
        .into_response()
}

/// Join `relative` onto `root`, refusing anything that could leave it.
fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

/// Host and port the client used to reach us, from the `Host` header.
fn host_and_port(headers: &HeaderMap) -> (String, String) {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (name.to_string(), port.to_string())
        }
        _ => (host.to_string(), "80".to_string()),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
