//! Handler-side view of one invocation.

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::any::Any;
use std::io::{Cursor, Write};
use std::mem;
use thiserror::Error;

use crate::binding::{BoundValue, DirectKind};
use crate::http::request::{FormPart, IncomingRequest};
use crate::http::response::OutgoingResponse;

/// Handler misuse of its own arguments. Reported as an internal fault.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("no argument at position {0}")]
    NoSuchArgument(usize),

    #[error("argument {index} is {found}, not {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("argument {index} is absent")]
    Absent { index: usize },

    #[error("argument {index} is the {kind:?} handle")]
    DirectHandle { index: usize, kind: DirectKind },

    #[error("argument {0} was already taken")]
    AlreadyTaken(usize),
}

pub(crate) enum Arg {
    Value(BoundValue),
    Direct(DirectKind),
    Taken,
}

/// Bound arguments plus the live request and response of one invocation.
pub struct Call<'a> {
    args: Vec<Arg>,
    request: &'a IncomingRequest,
    response: &'a mut OutgoingResponse,
}

impl<'a> Call<'a> {
    pub(crate) fn new(
        args: Vec<Arg>,
        request: &'a IncomingRequest,
        response: &'a mut OutgoingResponse,
    ) -> Self {
        Self {
            args,
            request,
            response,
        }
    }

    /// Take the argument at `index`. Absent values only convert into `Option`.
    pub fn arg<T: FromBound>(&mut self, index: usize) -> Result<T, CallError> {
        let value = self.take(index)?;
        T::from_bound(value).map_err(|rejected| match rejected {
            BoundValue::Null => CallError::Absent { index },
            other => CallError::TypeMismatch {
                index,
                expected: T::EXPECTED,
                found: other.kind(),
            },
        })
    }

    /// Take a structured (serde-decoded) argument.
    pub fn structured<T: Any>(&mut self, index: usize) -> Result<T, CallError> {
        match self.take(index)? {
            BoundValue::Structured(any) => match any.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(any) => {
                    self.args[index] = Arg::Value(BoundValue::Structured(any));
                    Err(CallError::TypeMismatch {
                        index,
                        expected: std::any::type_name::<T>(),
                        found: "another structured type",
                    })
                }
            },
            BoundValue::Null => Err(CallError::Absent { index }),
            other => {
                let found = other.kind();
                self.args[index] = Arg::Value(other);
                Err(CallError::TypeMismatch {
                    index,
                    expected: std::any::type_name::<T>(),
                    found,
                })
            }
        }
    }

    /// The handle kind declared at `index`, if that slot is a direct handle.
    pub fn handle_kind(&self, index: usize) -> Option<DirectKind> {
        match self.args.get(index) {
            Some(Arg::Direct(kind)) => Some(*kind),
            _ => None,
        }
    }

    pub fn request(&self) -> &IncomingRequest {
        self.request
    }

    pub fn response(&mut self) -> &mut OutgoingResponse {
        self.response
    }

    /// The response body stream.
    pub fn output(&mut self) -> &mut impl Write {
        &mut *self.response
    }

    /// A fresh reader over the request body.
    pub fn input(&self) -> Cursor<Bytes> {
        self.request.body_reader()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    fn take(&mut self, index: usize) -> Result<BoundValue, CallError> {
        let slot = self
            .args
            .get_mut(index)
            .ok_or(CallError::NoSuchArgument(index))?;
        match mem::replace(slot, Arg::Taken) {
            Arg::Value(value) => Ok(value),
            Arg::Direct(kind) => {
                *slot = Arg::Direct(kind);
                Err(CallError::DirectHandle { index, kind })
            }
            Arg::Taken => Err(CallError::AlreadyTaken(index)),
        }
    }
}

/// Conversion out of a bound value. `Err` hands the value back untouched.
pub trait FromBound: Sized {
    const EXPECTED: &'static str;

    fn from_bound(value: BoundValue) -> Result<Self, BoundValue>;
}

macro_rules! impl_from_bound {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl FromBound for $ty {
                const EXPECTED: &'static str = $name;

                fn from_bound(value: BoundValue) -> Result<Self, BoundValue> {
                    match value {
                        BoundValue::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_from_bound! {
    i32 => Int, "integer";
    i64 => Long, "long";
    f32 => Float, "float";
    f64 => Double, "double";
    Decimal => Decimal, "decimal";
    NaiveDate => Date, "date";
    NaiveDateTime => DateTime, "date-time";
    String => Text, "string";
    FormPart => Part, "multipart part";
}

impl<T: FromBound> FromBound for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_bound(value: BoundValue) -> Result<Self, BoundValue> {
        match value {
            BoundValue::Null => Ok(None),
            other => T::from_bound(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[derive(Debug, PartialEq)]
    struct Filter {
        term: String,
    }

    fn with_call<R>(args: Vec<Arg>, f: impl FnOnce(&mut Call<'_>) -> R) -> R {
        let request =
            IncomingRequest::new(Method::POST, "/a/b").with_body("text/plain", "body text");
        let mut response = OutgoingResponse::new();
        let mut call = Call::new(args, &request, &mut response);
        f(&mut call)
    }

    #[test]
    fn test_typed_args() {
        let args = vec![
            Arg::Value(BoundValue::Int(4)),
            Arg::Value(BoundValue::Text("x".into())),
            Arg::Value(BoundValue::Null),
        ];
        with_call(args, |call| {
            assert_eq!(call.arg::<i32>(0), Ok(4));
            assert_eq!(call.arg::<String>(1), Ok("x".to_string()));
            assert_eq!(call.arg::<Option<i64>>(2), Ok(None));
            assert_eq!(call.arg::<i32>(0), Err(CallError::AlreadyTaken(0)));
            assert_eq!(call.arg::<i32>(3), Err(CallError::NoSuchArgument(3)));
        });
    }

    #[test]
    fn test_absent_into_plain_type() {
        with_call(vec![Arg::Value(BoundValue::Null)], |call| {
            assert_eq!(call.arg::<i32>(0), Err(CallError::Absent { index: 0 }));
        });
    }

    #[test]
    fn test_type_mismatch() {
        with_call(vec![Arg::Value(BoundValue::Long(9))], |call| {
            let err = call.arg::<String>(0).unwrap_err();
            assert_eq!(err.to_string(), "argument 0 is long, not string");
        });
    }

    #[test]
    fn test_structured_arg() {
        let filter: Box<dyn Any + Send> = Box::new(Filter { term: "abc".into() });
        with_call(vec![Arg::Value(BoundValue::Structured(filter))], |call| {
            assert!(call.structured::<String>(0).is_err());
            assert_eq!(call.structured::<Filter>(0), Ok(Filter { term: "abc".into() }));
        });
    }

    #[test]
    fn test_direct_handles() {
        with_call(vec![Arg::Direct(DirectKind::OutputStream)], |call| {
            assert_eq!(call.handle_kind(0), Some(DirectKind::OutputStream));
            assert!(matches!(call.arg::<String>(0), Err(CallError::DirectHandle { .. })));

            call.output().write_all(b"streamed").unwrap();
            assert_eq!(call.response().body(), b"streamed");

            let mut body = String::new();
            std::io::Read::read_to_string(&mut call.input(), &mut body).unwrap();
            assert_eq!(body, "body text");
            assert_eq!(call.request().path(), "/a/b");
        });
    }
}
