//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! IncomingRequest
//!     → RouteTable::key_for (path, verb)
//!     → lookup                       miss → 405, no body
//!     → bind every slot in order     BindError → 400 text/plain
//!     → handler(&mut Call)           WebFault → status + message
//!                                    other error → 500 "Unexpected failure"
//!     → encoder.rs                   failure → 500 "Unexpected failure"
//!     → OutgoingResponse
//! ```
//!
//! # Design Decisions
//! - Synchronous: runs on a blocking worker, one request per call
//! - Stateless across requests; the only shared state is the immutable table
//! - A fault response replaces anything the handler already wrote

pub mod call;
pub mod encoder;
pub mod reply;

pub use call::{Call, CallError, FromBound};
pub use reply::Reply;

use http::header::HeaderValue;
use http::StatusCode;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use crate::error::WebFault;
use crate::http::request::IncomingRequest;
use crate::http::response::OutgoingResponse;
use crate::observability::metrics;
use crate::routing::{Action, RouteTable, Slot};
use call::Arg;

/// Body of every unexpected internal fault. Details only go to the log.
pub const UNEXPECTED_FAILURE: &str = "Unexpected failure";

/// Routes requests through the table to their handlers.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
}

impl Dispatcher {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn dispatch(&self, request: &IncomingRequest) -> OutgoingResponse {
        let mut response = OutgoingResponse::new();
        self.dispatch_into(request, &mut response);
        response
    }

    /// Serve `request`, writing status, headers and body into `response`.
    pub fn dispatch_into(&self, request: &IncomingRequest, response: &mut OutgoingResponse) {
        let start = Instant::now();
        let key = self.table.key_for(request.method(), request.path());
        let span = tracing::info_span!(
            "dispatch",
            route = %key,
            request_id = request.request_id().unwrap_or("-"),
        );
        let _entered = span.enter();

        let Some(action) = self.table.get(&key) else {
            tracing::info!(path = %request.path(), "No route matches request");
            response.reset();
            response.set_status(StatusCode::METHOD_NOT_ALLOWED);
            metrics::record_request(metrics::UNMATCHED, key.method().as_str(), 405, start);
            return;
        };

        if let Err(fault) = invoke(action, request, response) {
            write_fault(response, &fault);
        }

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "Request dispatched");
        metrics::record_request(action.path(), key.method().as_str(), status.as_u16(), start);
    }
}

fn invoke(
    action: &Action,
    request: &IncomingRequest,
    response: &mut OutgoingResponse,
) -> Result<(), WebFault> {
    let args = bind_arguments(action, request).map_err(|fault| {
        metrics::record_binding_failure(action.path());
        tracing::info!(reason = %fault, "Request rejected while binding parameters");
        fault
    })?;

    let reply = {
        let mut call = Call::new(args, request, response);
        (action.handler())(&mut call).map_err(handler_fault)?
    };

    encoder::encode(reply, action.produces(), response).map_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "Failed to encode reply");
        WebFault::internal(UNEXPECTED_FAILURE)
    })
}

/// Run every binder in declared order. The first failure wins.
pub(crate) fn bind_arguments(
    action: &Action,
    request: &IncomingRequest,
) -> Result<Vec<Arg>, WebFault> {
    action
        .slots()
        .iter()
        .map(|slot| match slot {
            Slot::Bind(binder) => binder(request).map(Arg::Value).map_err(WebFault::from),
            Slot::Direct(kind) => Ok(Arg::Direct(*kind)),
        })
        .collect()
}

fn handler_fault(err: anyhow::Error) -> WebFault {
    match err.downcast_ref::<WebFault>() {
        Some(fault) => fault.clone(),
        None => {
            tracing::error!(error = %format!("{err:#}"), "Handler failed");
            WebFault::internal(UNEXPECTED_FAILURE)
        }
    }
}

/// Replace the response with a plain-text fault.
pub fn write_fault(response: &mut OutgoingResponse, fault: &WebFault) {
    response.reset();
    response.set_status(fault.status());
    response.set_content_type(HeaderValue::from_static(encoder::TEXT_PLAIN));
    // Writing into the in-memory body cannot fail.
    let _ = response.write_all(fault.message().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BasicType, Param, ParamType};
    use crate::routing::{Route, Service};
    use http::header::CONTENT_DISPOSITION;
    use http::Method;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher(services: Vec<Service>) -> Dispatcher {
        let table = RouteTable::builder().services(services).build().unwrap();
        Dispatcher::new(Arc::new(table))
    }

    fn body(response: &OutgoingResponse) -> &str {
        std::str::from_utf8(response.body()).unwrap()
    }

    #[test]
    fn test_text_body_reaches_handler() {
        let d = dispatcher(vec![Service::new("/test").route(
            Route::post("/invoke")
                .produces(mime::TEXT_PLAIN)
                .param(Param::body(BasicType::Text))
                .handler(|call| {
                    let sql: String = call.arg(0)?;
                    Ok(Reply::text(format!("ran {sql}")))
                }),
        )]);

        let request =
            IncomingRequest::new(Method::POST, "/test/invoke").with_body("text/plain", "SELECT 1");
        let response = d.dispatch(&request);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(body(&response), "ran SELECT 1");
    }

    #[test]
    fn test_unmatched_is_405_without_body() {
        let d = dispatcher(vec![
            Service::new("/test").route(Route::get("").handler(|_| Ok(Reply::Empty)))
        ]);
        let response = d.dispatch(&IncomingRequest::new(Method::GET, "/unknown/thing"));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.body().is_empty());

        let wrong_verb = d.dispatch(&IncomingRequest::new(Method::POST, "/test"));
        assert_eq!(wrong_verb.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_bind_failure_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let d = dispatcher(vec![Service::new("/svc").route(
            Route::get("/x")
                .param(Param::query("id", BasicType::Int))
                .handler(move |call| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let id: Option<i32> = call.arg(0)?;
                    Ok(Reply::json(id)?)
                }),
        )]);

        let response = d.dispatch(&IncomingRequest::new(Method::GET, "/svc/x?id=abc"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.content_type(), Some("text/plain"));
        assert!(body(&response).contains("abc"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ok = d.dispatch(&IncomingRequest::new(Method::GET, "/svc/x?id=7"));
        assert_eq!(body(&ok), "7");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_web_fault_is_verbatim_and_discards_output() {
        let d = dispatcher(vec![Service::new("/secure").route(
            Route::get("/data").param(Param::output()).handler(|call| {
                call.output().write_all(b"partial")?;
                call.response()
                    .set_header(http::header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
                Err(WebFault::new(StatusCode::FORBIDDEN, "forbidden").into())
            }),
        )]);

        let response = d.dispatch(&IncomingRequest::new(Method::GET, "/secure/data"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body(&response), "forbidden");
        assert!(response.headers().get(http::header::CACHE_CONTROL).is_none());
    }

    #[test]
    fn test_unexpected_error_is_generic_500() {
        let d = dispatcher(vec![Service::new("/boom").route(
            Route::get("").handler(|_| Err(anyhow::anyhow!("database password is hunter2"))),
        )]);
        let response = d.dispatch(&IncomingRequest::new(Method::GET, "/boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response), UNEXPECTED_FAILURE);
    }

    #[test]
    fn test_argument_misuse_is_internal() {
        let d = dispatcher(vec![Service::new("/a").route(
            Route::get("/b")
                .param(Param::header("x-n", BasicType::Int))
                .handler(|call| {
                    let n: String = call.arg(0)?;
                    Ok(Reply::text(n))
                }),
        )]);
        let request = IncomingRequest::new(Method::GET, "/a/b").with_header("x-n", "3");
        assert_eq!(d.dispatch(&request).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_file_reply_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.txt");
        std::fs::write(&path, "rows").unwrap();
        let missing = dir.path().join("gone.txt");

        let d = dispatcher(vec![Service::new("/files")
            .route(Route::get("/export").handler(move |_| Ok(Reply::file(&path))))
            .route(Route::get("/gone").handler(move |_| Ok(Reply::file(&missing))))]);

        let response = d.dispatch(&IncomingRequest::new(Method::GET, "/files/export"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type(), Some("application/octet-stream"));
        assert_eq!(
            response.headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"export.txt\""
        );
        assert_eq!(body(&response), "rows");

        let gone = d.dispatch(&IncomingRequest::new(Method::GET, "/files/gone"));
        assert_eq!(gone.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(gone.headers().get(CONTENT_DISPOSITION).is_none());
    }

    #[test]
    fn test_structured_json_body_and_status_from_handler() {
        #[derive(Deserialize)]
        struct Order {
            sku: String,
            qty: u32,
        }

        let d = dispatcher(vec![Service::new("/orders").route(
            Route::post("")
                .param(Param::body(ParamType::structured::<Order>()))
                .handler(|call| {
                    let order: Order = call.structured(0)?;
                    call.response().set_status(StatusCode::CREATED);
                    Ok(Reply::json(serde_json::json!({ "sku": order.sku, "qty": order.qty }))?)
                }),
        )]);

        let request = IncomingRequest::new(Method::POST, "/orders")
            .with_body("application/json", r#"{"sku":"A","qty":3}"#);
        let response = d.dispatch(&request);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(body(&response), r#"{"qty":3,"sku":"A"}"#);

        let csv = IncomingRequest::new(Method::POST, "/orders").with_body("text/csv", "A,3");
        let rejected = d.dispatch(&csv);
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&rejected), "Unexpected content type: text/csv");

        let text = IncomingRequest::new(Method::POST, "/orders").with_body("text/plain", "A x3");
        let rejected = d.dispatch(&text);
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_repeated_requests_are_identical() {
        let d = dispatcher(vec![Service::new("/echo").route(
            Route::get("")
                .param(Param::query("q", BasicType::Text))
                .handler(|call| Ok(Reply::from(call.arg::<Option<String>>(0)?))),
        )]);
        let request = IncomingRequest::new(Method::GET, "/echo?q=same");
        let first = d.dispatch(&request);
        let second = d.dispatch(&request);
        assert_eq!(first.status(), second.status());
        assert_eq!(first.body(), second.body());
        assert_eq!(first.headers(), second.headers());
    }
}
