//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, mount path)
//!     → request.rs (buffer body, decode query/form/multipart)
//!     → [dispatcher on a blocking worker]
//!     → response.rs (status, headers, body → axum Response)
//!     → Send to client
//!
//! docs.rs serves the documentation tree next to the dispatcher.
//! ```

pub mod docs;
pub mod request;
pub mod response;
pub mod server;

pub use request::{FormPart, IncomingRequest, X_REQUEST_ID};
pub use response::OutgoingResponse;
pub use server::HttpServer;
