//! JSON codec used for request decoding and response encoding.
//!
//! Calendar values use chrono's naive types, whose serde representation is the
//! ISO format also used when casting header, query and form strings.

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// ISO calendar date, e.g. `2024-03-01`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// ISO calendar date-time without offset, e.g. `2024-03-01T10:15:30.250`.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// ISO calendar date-time to the minute, e.g. `2024-03-01T10:15`.
pub const DATE_TIME_MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse an ISO local date-time. Seconds and their fraction are optional.
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, DATE_TIME_MINUTES_FORMAT))
        .ok()
}

/// Deserialize an ISO local date-time string, seconds optional.
pub fn date_time_from_value(value: Value) -> Result<NaiveDateTime, serde_json::Error> {
    let raw: String = from_value(value)?;
    parse_date_time(&raw).ok_or_else(|| {
        <serde_json::Error as serde::de::Error>::custom(format!("invalid date-time `{raw}`"))
    })
}

pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

pub fn to_value<T: Serialize>(value: T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}

pub fn from_slice(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn from_str(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}
