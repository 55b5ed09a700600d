//! String and JSON conversion into basic types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use super::{BasicType, BoundValue};
use crate::error::BindError;
use crate::json::{self, DATE_FORMAT};

impl BasicType {
    /// Human-readable name used in client-facing messages.
    pub fn name(self) -> &'static str {
        match self {
            BasicType::Int => "integer",
            BasicType::Long => "long",
            BasicType::Float => "float",
            BasicType::Double => "double",
            BasicType::Decimal => "decimal",
            BasicType::Date => "date (YYYY-MM-DD)",
            BasicType::DateTime => "date-time (YYYY-MM-DDTHH:MM[:SS])",
            BasicType::Text => "string",
        }
    }

    /// Convert a raw string. `None` when the string is not a valid value.
    pub fn cast(self, raw: &str) -> Option<BoundValue> {
        let value = match self {
            BasicType::Int => BoundValue::Int(raw.parse().ok()?),
            BasicType::Long => BoundValue::Long(raw.parse().ok()?),
            BasicType::Float => BoundValue::Float(raw.parse().ok()?),
            BasicType::Double => BoundValue::Double(raw.parse().ok()?),
            BasicType::Decimal => BoundValue::Decimal(raw.parse::<Decimal>().ok()?),
            BasicType::Date => BoundValue::Date(NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()?),
            BasicType::DateTime => BoundValue::DateTime(json::parse_date_time(raw)?),
            BasicType::Text => BoundValue::Text(raw.to_string()),
        };
        Some(value)
    }

    /// Deserialize a JSON value into this type.
    pub fn decode_json(self, value: Value) -> Result<BoundValue, serde_json::Error> {
        let bound = match self {
            BasicType::Int => BoundValue::Int(json::from_value(value)?),
            BasicType::Long => BoundValue::Long(json::from_value(value)?),
            BasicType::Float => BoundValue::Float(json::from_value(value)?),
            BasicType::Double => BoundValue::Double(json::from_value(value)?),
            BasicType::Decimal => BoundValue::Decimal(json::from_value(value)?),
            BasicType::Date => BoundValue::Date(json::from_value(value)?),
            BasicType::DateTime => BoundValue::DateTime(json::date_time_from_value(value)?),
            BasicType::Text => BoundValue::Text(json::from_value(value)?),
        };
        Ok(bound)
    }
}

/// Cast an optional raw value; absent stays `Null`.
pub fn cast_optional(
    ty: BasicType,
    raw: Option<&str>,
    origin: impl FnOnce() -> String,
) -> Result<BoundValue, BindError> {
    let Some(raw) = raw else {
        return Ok(BoundValue::Null);
    };
    ty.cast(raw).ok_or_else(|| BindError::InvalidValue {
        origin: origin(),
        value: raw.to_string(),
        expected: ty.name(),
    })
}
