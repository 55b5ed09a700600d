//! Binder construction.
//!
//! # Responsibilities
//! - Turn one declared `Param` into a binder function
//! - Reject (source, type) pairs that can never bind
//!
//! # Resolution order
//! 1. Header(name)  → header string → cast
//! 2. Query(name)   → query string → cast
//! 3. Form(name)    → raw part | form field or part text → cast | part text → JSON
//! 4. Direct(kind)  → no binder, the dispatcher injects the live handle
//! 5. Body          → by content type: text, JSON, URL-encoded form, multipart

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use super::cast::cast_optional;
use super::{BasicType, BindingSource, BoundValue, Param, ParamType, StructuredType};
use crate::error::BindError;
use crate::http::request::IncomingRequest;
use crate::json;

/// Extracts one parameter value from a request.
pub type ParameterBinder =
    Arc<dyn Fn(&IncomingRequest) -> Result<BoundValue, BindError> + Send + Sync>;

/// A declared parameter that no request could ever satisfy.
#[derive(Debug, Error)]
#[error("{ty} cannot be bound from {origin}")]
pub struct UnsupportedBinding {
    pub origin: String,
    pub ty: &'static str,
}

/// Build the binder for `param`. Direct handles are injected by the
/// dispatcher and have no binder.
pub fn binder_for(param: &Param) -> Result<ParameterBinder, UnsupportedBinding> {
    match param.source() {
        BindingSource::Header(name) => header_binder(name, declared(param)?),
        BindingSource::Query(name) => query_binder(name, declared(param)?),
        BindingSource::Form(name) => Ok(form_binder(name, declared(param)?)),
        BindingSource::Body => body_binder(declared(param)?),
        BindingSource::Direct(kind) => Err(UnsupportedBinding {
            origin: format!("{kind:?} handle"),
            ty: "directly injected handle",
        }),
    }
}

fn declared(param: &Param) -> Result<&ParamType, UnsupportedBinding> {
    param.ty().ok_or_else(|| UnsupportedBinding {
        origin: origin_of(param.source()),
        ty: "untyped parameter",
    })
}

fn origin_of(source: &BindingSource) -> String {
    match source {
        BindingSource::Header(name) => format!("header `{name}`"),
        BindingSource::Query(name) => format!("query parameter `{name}`"),
        BindingSource::Form(name) => format!("form field `{name}`"),
        BindingSource::Body => "request body".to_string(),
        BindingSource::Direct(kind) => format!("{kind:?} handle"),
    }
}

/// Header and query sources only carry strings, so only basic types qualify.
fn basic(ty: &ParamType, origin: impl FnOnce() -> String) -> Result<BasicType, UnsupportedBinding> {
    match ty {
        ParamType::Basic(basic) => Ok(*basic),
        other => Err(UnsupportedBinding {
            origin: origin(),
            ty: other.name(),
        }),
    }
}

fn header_binder(name: &str, ty: &ParamType) -> Result<ParameterBinder, UnsupportedBinding> {
    let origin = format!("header `{name}`");
    let ty = basic(ty, || origin.clone())?;
    let name = name.to_string();
    Ok(Arc::new(move |req: &IncomingRequest| {
        let raw = match req.header(&name) {
            Some(value) => Some(value.to_str().map_err(|_| BindError::InvalidUtf8 {
                origin: origin.clone(),
            })?),
            None => None,
        };
        cast_optional(ty, raw, || origin.clone())
    }))
}

fn query_binder(name: &str, ty: &ParamType) -> Result<ParameterBinder, UnsupportedBinding> {
    let origin = format!("query parameter `{name}`");
    let ty = basic(ty, || origin.clone())?;
    let name = name.to_string();
    Ok(Arc::new(move |req: &IncomingRequest| {
        cast_optional(ty, req.query(&name), || origin.clone())
    }))
}

fn form_binder(name: &str, ty: &ParamType) -> ParameterBinder {
    let origin = format!("form field `{name}`");
    let name = name.to_string();
    match ty.clone() {
        ParamType::Part => Arc::new(move |req: &IncomingRequest| {
            let part = req.part(&name).map_err(multipart_error)?;
            Ok(part.cloned().map_or(BoundValue::Null, BoundValue::Part))
        }),
        ParamType::Basic(basic) => Arc::new(move |req: &IncomingRequest| {
            let raw = if is_urlencoded(req) {
                req.form_field(&name)
            } else {
                match req.part(&name).map_err(multipart_error)? {
                    Some(part) => Some(
                        part.text()
                            .map_err(|_| BindError::InvalidUtf8 {
                                origin: origin.clone(),
                            })?
                            .to_string(),
                    ),
                    None => None,
                }
            };
            cast_optional(basic, raw.as_deref(), || origin.clone())
        }),
        ParamType::Structured(structured) => Arc::new(move |req: &IncomingRequest| {
            let part = req
                .part(&name)
                .map_err(multipart_error)?
                .ok_or_else(|| BindError::MissingPart(name.clone()))?;
            let text = part.text().map_err(|_| BindError::InvalidUtf8 {
                origin: origin.clone(),
            })?;
            let value = json::from_str(text).map_err(|e| malformed(&origin, e))?;
            decode_structured(&structured, value, &origin)
        }),
    }
}

/// What a body binder may decode into.
#[derive(Clone)]
enum BodyTarget {
    Basic(BasicType),
    Structured(StructuredType),
}

impl BodyTarget {
    fn decode(&self, value: Value) -> Result<BoundValue, BindError> {
        match self {
            BodyTarget::Basic(ty) => ty
                .decode_json(value)
                .map_err(|e| malformed("request body", e)),
            BodyTarget::Structured(ty) => decode_structured(ty, value, "request body"),
        }
    }

    fn from_text(&self, text: &str) -> Result<BoundValue, BindError> {
        match self {
            BodyTarget::Basic(ty) => cast_optional(*ty, Some(text), || "request body".to_string()),
            BodyTarget::Structured(_) => self.decode(Value::String(text.to_string())),
        }
    }
}

fn body_binder(ty: &ParamType) -> Result<ParameterBinder, UnsupportedBinding> {
    let target = match ty {
        ParamType::Basic(basic) => BodyTarget::Basic(*basic),
        ParamType::Structured(structured) => BodyTarget::Structured(structured.clone()),
        ParamType::Part => {
            return Err(UnsupportedBinding {
                origin: "request body".to_string(),
                ty: ty.name(),
            })
        }
    };

    Ok(Arc::new(move |req: &IncomingRequest| {
        let essence = req.content_type_essence();
        match essence.as_deref() {
            Some(ct) if ct == mime::TEXT_PLAIN.essence_str() => {
                let text = std::str::from_utf8(req.body()).map_err(|_| BindError::InvalidUtf8 {
                    origin: "request body".to_string(),
                })?;
                target.from_text(text)
            }
            Some(ct) if ct == mime::APPLICATION_JSON.essence_str() => {
                let value = json::from_slice(req.body()).map_err(|e| malformed("request body", e))?;
                target.decode(value)
            }
            Some(ct) if ct == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() => {
                let mut fields = Map::new();
                for (key, value) in req.form_fields() {
                    fields.entry(key).or_insert(Value::String(value));
                }
                target.decode(Value::Object(fields))
            }
            Some(ct) if ct == mime::MULTIPART_FORM_DATA.essence_str() => {
                let mut fields = Map::new();
                for part in req.parts().map_err(multipart_error)? {
                    let text = part.text().map_err(|_| BindError::InvalidUtf8 {
                        origin: format!("multipart part `{}`", part.name()),
                    })?;
                    fields.insert(part.name().to_string(), Value::String(text.to_string()));
                }
                target.decode(Value::Object(fields))
            }
            _ => Err(BindError::UnsupportedContentType(
                req.content_type().unwrap_or("none").to_string(),
            )),
        }
    }))
}

fn is_urlencoded(req: &IncomingRequest) -> bool {
    req.content_type_essence().as_deref()
        == Some(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
}

fn decode_structured(
    ty: &StructuredType,
    value: Value,
    origin: &str,
) -> Result<BoundValue, BindError> {
    ty.decode(value)
        .map(BoundValue::Structured)
        .map_err(|e| malformed(origin, e))
}

fn malformed(origin: &str, err: serde_json::Error) -> BindError {
    BindError::Malformed {
        origin: origin.to_string(),
        reason: err.to_string(),
    }
}

fn multipart_error(reason: &str) -> BindError {
    BindError::Malformed {
        origin: "multipart body".to_string(),
        reason: reason.to_string(),
    }
}
