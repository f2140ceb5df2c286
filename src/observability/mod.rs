//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, middleware, transport produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (plain or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the transport span and the access log
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
