//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP layer and dispatcher produce:
//!     → logging.rs (structured log events, request id on every span)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the HTTP layer into the dispatch span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
