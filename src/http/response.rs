//! Outgoing response handle.
//!
//! # Responsibilities
//! - Collect status, headers and body written by the dispatcher and handlers
//! - Convert the result into an axum `Response`
//!
//! # Design Decisions
//! - The body is buffered; handlers that take the output stream write into it
//! - `reset` discards everything so fault responses never mix with partial output

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use std::io;

#[derive(Debug, Default)]
pub struct OutgoingResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl OutgoingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn set_content_type(&mut self, value: HeaderValue) {
        self.headers.insert(CONTENT_TYPE, value);
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body stream handlers write into.
    pub fn output(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    /// Back to an empty 200 response.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
    }
}

impl io::Write for OutgoingResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl IntoResponse for OutgoingResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
