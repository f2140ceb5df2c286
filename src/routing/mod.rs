//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (setup):
//!     get/post/.../all(template, handler)
//!     → pattern.rs (compile template into segments)
//!     → table.rs (append Route, mount sub-tables under a prefix)
//!     → RouteTable::build() → immutable RouteSet
//!
//! Incoming Request (method, path)
//!     → RouteSet::lookup (registration-order scan)
//!     → Return: RouteMatch { route, params } or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable once built
//! - No regex: segment-by-segment comparison
//! - Deterministic: first registered match wins

pub mod handler;
pub mod pattern;
pub mod router;
pub mod table;

pub use handler::Handler;
pub use pattern::{Params, PathPattern};
pub use router::Router;
pub use table::{join_paths, MethodFilter, Route, RouteMatch, RouteSet, RouteTable};
