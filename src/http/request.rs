//! Incoming request view handed to the dispatcher.
//!
//! # Responsibilities
//! - Buffer the request body (bounded by the configured limit)
//! - Parse the query string, URL-encoded form fields and multipart parts
//! - Expose a read-only `IncomingRequest` to binders and handlers
//!
//! # Design Decisions
//! - Multipart bodies are parsed before dispatch because multer is async and the
//!   dispatcher is not; a parse failure is kept and only surfaces (as a 400)
//!   when a binder actually asks for parts
//! - Header lookup is case-insensitive (`HeaderMap`)
//! - Query and form lookups return the first value for a repeated name

use bytes::Bytes;
use futures_util::stream;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use mime::Mime;
use std::io::Cursor;

/// Header carrying the correlation id set by the request-id layer.
pub const X_REQUEST_ID: &str = "x-request-id";

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl FormPart {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// The part body decoded as UTF-8.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }

    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }
}

/// A fully buffered HTTP request.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    parts: Result<Vec<FormPart>, String>,
}

impl IncomingRequest {
    /// Create a request for `target`, a path with an optional query string
    /// (`/svc/x?id=1`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_pairs(query.as_bytes())),
            None => (target, Vec::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            parts: Ok(Vec::new()),
        }
    }

    /// Assemble a request from already-split HTTP parts.
    pub fn from_parts(method: Method, target: &str, headers: HeaderMap, body: Bytes) -> Self {
        let mut request = Self::new(method, target);
        request.headers = headers;
        request.body = body;
        request
    }

    /// Append a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set the body together with its declared content type.
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self.body = body.into();
        self
    }

    /// Declare a `multipart/form-data` request with already-decoded parts.
    pub fn with_parts(mut self, parts: Vec<FormPart>) -> Self {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=prepared"),
        );
        self.parts = Ok(parts);
        self
    }

    /// Decode the multipart body, if the request declares one.
    pub async fn read_multipart(mut self) -> Self {
        if self.content_type_essence().as_deref() != Some(mime::MULTIPART_FORM_DATA.essence_str()) {
            return self;
        }
        self.parts = match self.content_type().map(multer::parse_boundary) {
            Some(Ok(boundary)) => decode_parts(self.body.clone(), boundary)
                .await
                .map_err(|e| e.to_string()),
            Some(Err(e)) => Err(e.to_string()),
            None => Err("missing boundary".to_string()),
        };
        if let Err(reason) = &self.parts {
            tracing::debug!(
                path = %self.path,
                reason = %reason,
                "Multipart body could not be decoded"
            );
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The raw `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str()).and_then(|v| v.to_str().ok())
    }

    /// The content type without parameters, lowercased (`multipart/form-data`).
    pub fn content_type_essence(&self) -> Option<String> {
        self.content_type()?
            .parse::<Mime>()
            .ok()
            .map(|m| m.essence_str().to_string())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }

    /// Fields of an `application/x-www-form-urlencoded` body.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        parse_pairs(&self.body)
    }

    pub fn form_field(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(&self.body)
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Decoded multipart parts, or the reason decoding failed.
    pub fn parts(&self) -> Result<&[FormPart], &str> {
        match &self.parts {
            Ok(parts) => Ok(parts),
            Err(reason) => Err(reason),
        }
    }

    pub fn part(&self, name: &str) -> Result<Option<&FormPart>, &str> {
        Ok(self.parts()?.iter().find(|p| p.name == name))
    }
}

fn parse_pairs(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

async fn decode_parts(body: Bytes, boundary: String) -> Result<Vec<FormPart>, multer::Error> {
    let stream = stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|m| m.to_string());
        let data = field.bytes().await?;
        parts.push(FormPart {
            name,
            file_name,
            content_type,
            data,
        });
    }
    Ok(parts)
}
