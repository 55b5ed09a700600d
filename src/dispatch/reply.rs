//! Handler return values.

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::json;

/// What a handler produced. The encoder picks the wire format from the
/// variant and the route's declared output type.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No body; the status stays whatever the handler set.
    Empty,
    /// Written verbatim when the route produces `text/plain`, otherwise as a JSON string.
    Text(String),
    Json(Value),
    /// Streamed as an attachment named after the file.
    File(PathBuf),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    /// Serialize any value into a JSON reply.
    pub fn json<T: Serialize>(value: T) -> Result<Self, serde_json::Error> {
        json::to_value(value).map(Reply::Json)
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Reply::File(path.into())
    }

    /// Whether encoding writes no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty | Reply::Json(Value::Null))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<PathBuf> for Reply {
    fn from(path: PathBuf) -> Self {
        Reply::File(path)
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reply::Empty, Into::into)
    }
}
