//! Error model for the dispatch engine.
//!
//! # Taxonomy
//! - `BuildError`: configuration faults found while building the route table (fatal)
//! - `BindError`: client faults found while binding parameters (400)
//! - `WebFault`: semantic faults raised by handler code (status and message sent verbatim)
//! - any other handler error is an unexpected internal fault (500, nothing leaked)

use http::{Method, StatusCode};
use thiserror::Error;

/// A semantic error carrying the HTTP status and the client-facing message.
///
/// Handlers return it through `anyhow` (`Err(WebFault::new(..).into())`); the
/// dispatcher recognises it and renders it as a plain-text response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct WebFault {
    status: StatusCode,
    message: String,
}

impl WebFault {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build a fault from a raw status code. Codes outside 100..=999 become 500.
    pub fn from_code(code: u16, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// A 500 fault with an explicit message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Route table construction failures. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A parameter declares a type its binding source cannot produce.
    #[error("route {route}: parameter #{index} is unsupported ({reason})")]
    UnsupportedParameter {
        route: String,
        index: usize,
        reason: String,
    },

    /// Two routes resolve to the same (path, verb) key.
    #[error("duplicate route {method} {path}")]
    DuplicateRoute { method: Method, path: String },

    /// Under segment matching, paths deeper than two segments never match a request.
    #[error("route {method} {path} has more than two segments and can never be matched")]
    UnreachableRoute { method: Method, path: String },

    #[error("route {path} declares no HTTP verbs")]
    NoVerbs { path: String },

    #[error("route {path} has no handler")]
    MissingHandler { path: String },

    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

/// Parameter binding failures. Always the client's fault.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid value `{value}` for {origin}: expected {expected}")]
    InvalidValue {
        origin: String,
        value: String,
        expected: &'static str,
    },

    #[error("missing multipart part `{0}`")]
    MissingPart(String),

    #[error("{origin} is not valid UTF-8")]
    InvalidUtf8 { origin: String },

    #[error("Unexpected content type: {0}")]
    UnsupportedContentType(String),

    #[error("malformed {origin}: {reason}")]
    Malformed { origin: String, reason: String },
}

impl From<BindError> for WebFault {
    fn from(err: BindError) -> Self {
        WebFault::bad_request(err.to_string())
    }
}
