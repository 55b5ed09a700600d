//! Demo services registered by the `rpc-dispatch` binary.
//!
//! `/test/invoke` accepts a plain-text statement and reports it back; the
//! `/demo` routes exercise each binding source and reply kind.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binding::{BasicType, Param, ParamType};
use crate::dispatch::Reply;
use crate::error::WebFault;
use crate::http::FormPart;
use crate::routing::{Route, Service};

/// Order accepted by `POST /demo/order`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Order {
    pub sku: String,
    pub quantity: u32,
    #[serde(default)]
    pub note: Option<String>,
}

/// Every demo service.
pub fn services() -> Vec<Service> {
    vec![invoke_service(), demo_service()]
}

/// `POST /test/invoke` with a `text/plain` statement.
pub fn invoke_service() -> Service {
    Service::new("/test").route(
        Route::post("/invoke")
            .produces(mime::TEXT_PLAIN)
            .param(Param::body(BasicType::Text))
            .handler(|call| {
                let statement: String = call.arg(0)?;
                let statement = statement.trim();
                if statement.is_empty() {
                    return Err(WebFault::bad_request("empty statement").into());
                }
                tracing::info!(statement = %statement, "Statement received");
                Ok(Reply::text(format!("accepted: {statement}")))
            }),
    )
}

fn demo_service() -> Service {
    Service::new("/demo")
        .route(
            Route::get("/echo")
                .param(Param::header("x-user", BasicType::Text))
                .param(Param::query("times", BasicType::Int))
                .handler(|call| {
                    let user: Option<String> = call.arg(0)?;
                    let times: Option<i32> = call.arg(1)?;
                    Ok(Reply::json(serde_json::json!({
                        "user": user.unwrap_or_else(|| "anonymous".to_string()),
                        "times": times.unwrap_or(1),
                    }))?)
                }),
        )
        .route(
            Route::post("/order")
                .also(http::Method::PUT)
                .param(Param::body(ParamType::structured::<Order>()))
                .handler(|call| {
                    let order: Order = call.structured(0)?;
                    if order.quantity == 0 {
                        return Err(WebFault::from_code(422, "quantity must be positive").into());
                    }
                    call.response().set_status(StatusCode::CREATED);
                    Ok(Reply::json(order)?)
                }),
        )
        .route(
            Route::post("/upload")
                .param(Param::form("title", BasicType::Text))
                .param(Param::form("file", ParamType::Part))
                .handler(|call| {
                    let title: Option<String> = call.arg(0)?;
                    let file: Option<FormPart> = call.arg(1)?;
                    let file = file.ok_or_else(|| WebFault::bad_request("missing file"))?;
                    Ok(Reply::json(serde_json::json!({
                        "title": title,
                        "file_name": file.file_name(),
                        "size": file.bytes().len(),
                    }))?)
                }),
        )
        .route(
            Route::get("/report")
                .param(Param::query("rows", BasicType::Int))
                .handler(|call| {
                    let rows: Option<i32> = call.arg(0)?;
                    let path = write_report(rows.unwrap_or(3).max(0))?;
                    Ok(Reply::file(path))
                }),
        )
        .route(
            Route::get("/stream")
                .param(Param::output())
                .handler(|call| {
                    let out = call.output();
                    for n in 1..=3 {
                        writeln!(out, "chunk {n}")?;
                    }
                    call.response().set_header(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_static("text/plain"),
                    );
                    Ok(Reply::Empty)
                }),
        )
        .route(
            Route::get("/secure")
                .handler(|_| Err(WebFault::new(StatusCode::FORBIDDEN, "forbidden").into())),
        )
}

static REPORT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Each call gets its own file so concurrent downloads never share one.
fn write_report(rows: i32) -> std::io::Result<PathBuf> {
    let seq = REPORT_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "rpc-dispatch-report-{}-{seq}.csv",
        std::process::id()
    ));
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, "row,value")?;
    for row in 1..=rows {
        writeln!(file, "{row},{}", row * row)?;
    }
    Ok(path)
}
