//! Parameter binding subsystem.
//!
//! # Data Flow
//! ```text
//! Route declaration (at startup):
//!     Param { source, type }
//!     → factory.rs (validate, build one binder per parameter)
//!     → Option<ParameterBinder>   (None = live handle injected at call time)
//!
//! Per request:
//!     &IncomingRequest
//!     → binder (header / query / form / body)
//!     → cast.rs (string → basic type) or JSON decode (structured type)
//!     → BoundValue
//! ```
//!
//! # Design Decisions
//! - Binding source is a tagged variant matched in one place
//! - Unsupported (source, type) pairs are rejected while building, never per request
//! - Binders are pure functions of the request; they hold no state

pub mod cast;
pub mod factory;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;

use crate::http::request::FormPart;

pub use factory::{binder_for, ParameterBinder, UnsupportedBinding};

/// Handles the dispatcher injects directly instead of binding a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectKind {
    Request,
    Response,
    OutputStream,
    InputStream,
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    Header(String),
    Query(String),
    Form(String),
    Body,
    Direct(DirectKind),
}

/// Types eligible for direct string conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    Float,
    Double,
    Decimal,
    /// ISO calendar date.
    Date,
    /// ISO calendar date-time without offset.
    DateTime,
    Text,
}

/// A serde type decoded from JSON, type-erased so routes can be stored uniformly.
#[derive(Clone)]
pub struct StructuredType {
    name: &'static str,
    decode: fn(Value) -> Result<Box<dyn Any + Send>, serde_json::Error>,
}

impl StructuredType {
    pub fn of<T: DeserializeOwned + Send + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            decode: decode_boxed::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn decode(&self, value: Value) -> Result<Box<dyn Any + Send>, serde_json::Error> {
        (self.decode)(value)
    }
}

fn decode_boxed<T: DeserializeOwned + Send + 'static>(
    value: Value,
) -> Result<Box<dyn Any + Send>, serde_json::Error> {
    serde_json::from_value::<T>(value).map(|v| Box::new(v) as Box<dyn Any + Send>)
}

impl fmt::Debug for StructuredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StructuredType").field(&self.name).finish()
    }
}

/// Declared type of a bound parameter.
#[derive(Debug, Clone)]
pub enum ParamType {
    Basic(BasicType),
    /// The raw multipart part.
    Part,
    Structured(StructuredType),
}

impl ParamType {
    pub fn structured<T: DeserializeOwned + Send + 'static>() -> Self {
        ParamType::Structured(StructuredType::of::<T>())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Basic(ty) => ty.name(),
            ParamType::Part => "multipart part",
            ParamType::Structured(ty) => ty.name(),
        }
    }
}

impl From<BasicType> for ParamType {
    fn from(ty: BasicType) -> Self {
        ParamType::Basic(ty)
    }
}

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub struct Param {
    source: BindingSource,
    ty: Option<ParamType>,
}

impl Param {
    pub fn header(name: impl Into<String>, ty: impl Into<ParamType>) -> Self {
        Self::typed(BindingSource::Header(name.into()), ty)
    }

    pub fn query(name: impl Into<String>, ty: impl Into<ParamType>) -> Self {
        Self::typed(BindingSource::Query(name.into()), ty)
    }

    pub fn form(name: impl Into<String>, ty: impl Into<ParamType>) -> Self {
        Self::typed(BindingSource::Form(name.into()), ty)
    }

    /// Bound from the whole body according to its content type.
    pub fn body(ty: impl Into<ParamType>) -> Self {
        Self::typed(BindingSource::Body, ty)
    }

    pub fn direct(kind: DirectKind) -> Self {
        Self {
            source: BindingSource::Direct(kind),
            ty: None,
        }
    }

    pub fn request() -> Self {
        Self::direct(DirectKind::Request)
    }

    pub fn response() -> Self {
        Self::direct(DirectKind::Response)
    }

    pub fn output() -> Self {
        Self::direct(DirectKind::OutputStream)
    }

    pub fn input() -> Self {
        Self::direct(DirectKind::InputStream)
    }

    fn typed(source: BindingSource, ty: impl Into<ParamType>) -> Self {
        Self {
            source,
            ty: Some(ty.into()),
        }
    }

    pub fn source(&self) -> &BindingSource {
        &self.source
    }

    /// Declared type; `None` for direct handles.
    pub fn ty(&self) -> Option<&ParamType> {
        self.ty.as_ref()
    }
}

/// A parameter value produced by a binder.
pub enum BoundValue {
    /// The source was absent (missing header, query parameter or form field).
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
    Part(FormPart),
    Structured(Box<dyn Any + Send>),
}

impl BoundValue {
    pub fn kind(&self) -> &'static str {
        match self {
            BoundValue::Null => "null",
            BoundValue::Int(_) => "integer",
            BoundValue::Long(_) => "long",
            BoundValue::Float(_) => "float",
            BoundValue::Double(_) => "double",
            BoundValue::Decimal(_) => "decimal",
            BoundValue::Date(_) => "date",
            BoundValue::DateTime(_) => "date-time",
            BoundValue::Text(_) => "string",
            BoundValue::Part(_) => "multipart part",
            BoundValue::Structured(_) => "structured value",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BoundValue::Null)
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Null => f.write_str("Null"),
            BoundValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
            BoundValue::Long(v) => f.debug_tuple("Long").field(v).finish(),
            BoundValue::Float(v) => f.debug_tuple("Float").field(v).finish(),
            BoundValue::Double(v) => f.debug_tuple("Double").field(v).finish(),
            BoundValue::Decimal(v) => f.debug_tuple("Decimal").field(v).finish(),
            BoundValue::Date(v) => f.debug_tuple("Date").field(v).finish(),
            BoundValue::DateTime(v) => f.debug_tuple("DateTime").field(v).finish(),
            BoundValue::Text(v) => f.debug_tuple("Text").field(v).finish(),
            BoundValue::Part(v) => f.debug_tuple("Part").field(&v.name()).finish(),
            BoundValue::Structured(_) => f.write_str("Structured(..)"),
        }
    }
}
