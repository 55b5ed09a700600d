//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Service[] (base path + Route declarations)
//!     → router.rs (combine paths, expand verbs, build binders)
//!     → matcher.rs (normalize paths, reject unreachable ones)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (verb, path):
//!     → matcher.rs (reduce path to key path)
//!     → router.rs (HashMap lookup on (path, verb))
//!     → Return: Action or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (exact key lookup only)
//! - Deterministic: same input always resolves to the same action

pub mod matcher;
pub mod router;
pub mod service;

pub use matcher::RouteMatching;
pub use router::{Action, RouteKey, RouteTable, RouteTableBuilder, Slot};
pub use service::{Handler, Route, Service};
