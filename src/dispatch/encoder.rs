//! Response encoding.
//!
//! # Selection order
//! 1. `Reply::File`  → `application/octet-stream` attachment named after the file
//! 2. `Reply::Text` on a route producing `text/plain` → written verbatim
//! 3. Anything else with a value → JSON
//! 4. `Reply::Empty` (or JSON null) → no body, status untouched

use anyhow::Context;
use http::header::{HeaderValue, CONTENT_DISPOSITION};
use mime::Mime;
use serde_json::Value;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use super::Reply;
use crate::http::response::OutgoingResponse;
use crate::json;

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Write `reply` into `response`. Failures here are internal faults.
pub fn encode(
    reply: Reply,
    produces: Option<&Mime>,
    response: &mut OutgoingResponse,
) -> anyhow::Result<()> {
    match reply {
        Reply::Empty | Reply::Json(Value::Null) => Ok(()),
        Reply::File(path) => encode_file(&path, response),
        Reply::Text(text) if produces_text(produces) => {
            response.set_content_type(HeaderValue::from_static(TEXT_PLAIN));
            response.write_all(text.as_bytes())?;
            Ok(())
        }
        Reply::Text(text) => encode_json(&Value::String(text), response),
        Reply::Json(value) => encode_json(&value, response),
    }
}

fn produces_text(produces: Option<&Mime>) -> bool {
    produces.is_some_and(|m| m.essence_str() == mime::TEXT_PLAIN.essence_str())
}

fn encode_json(value: &Value, response: &mut OutgoingResponse) -> anyhow::Result<()> {
    let body = json::to_string(value).context("serializing reply")?;
    response.set_content_type(HeaderValue::from_static(APPLICATION_JSON));
    response.write_all(body.as_bytes())?;
    Ok(())
}

fn encode_file(path: &Path, response: &mut OutgoingResponse) -> anyhow::Result<()> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name.replace('"', "")))
            .context("building Content-Disposition")?;

    response.set_content_type(HeaderValue::from_static(OCTET_STREAM));
    response.set_header(CONTENT_DISPOSITION, disposition);
    io::copy(&mut file, response.output()).with_context(|| format!("reading {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn encoded(reply: Reply, produces: Option<&Mime>) -> OutgoingResponse {
        let mut response = OutgoingResponse::new();
        encode(reply, produces, &mut response).unwrap();
        response
    }

    #[test]
    fn test_text_on_plain_route_is_verbatim() {
        let response = encoded(Reply::text("SELECT 1"), Some(&mime::TEXT_PLAIN_UTF_8));
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.body(), b"SELECT 1");
    }

    #[test]
    fn test_text_elsewhere_is_json() {
        let response = encoded(Reply::text("hi"), None);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.body(), b"\"hi\"");
    }

    #[test]
    fn test_json_value() {
        let response = encoded(
            Reply::Json(serde_json::json!({"rows": [1, 2]})),
            Some(&mime::TEXT_PLAIN),
        );
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.body(), br#"{"rows":[1,2]}"#);
    }

    #[test]
    fn test_empty_leaves_response_untouched() {
        let mut response = OutgoingResponse::new();
        response.set_status(StatusCode::ACCEPTED);
        encode(Reply::Empty, None, &mut response).unwrap();
        encode(Reply::Json(Value::Null), None, &mut response).unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.body().is_empty());
        assert!(response.content_type().is_none());
    }

    #[test]
    fn test_file_is_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let response = encoded(Reply::file(&path), None);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type(), Some("application/octet-stream"));
        assert_eq!(
            response.headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"report.csv\""
        );
        assert_eq!(response.body(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_missing_file_fails() {
        let mut response = OutgoingResponse::new();
        assert!(encode(Reply::file("/definitely/not/here.bin"), None, &mut response).is_err());
    }
}
