//! RPC-over-HTTP dispatch engine.
//!
//! Services declare routes (verbs, path suffix, typed parameters and a
//! handler); the route table binds each parameter from headers, query string,
//! form fields or the body and encodes the handler's reply as text, JSON or a
//! file download.

pub mod binding;
pub mod config;
pub mod demo;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod json;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use dispatch::{Call, Dispatcher, Reply};
pub use error::{BindError, BuildError, WebFault};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Route, RouteTable, Service};
