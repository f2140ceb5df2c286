//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, concurrency bound)
//!     → request.rs (Request context: URL, query, headers, body stream)
//!     → [dispatcher runs middleware + routing]
//!     → response.rs (Response context: single terminal write, hooks)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{Query, Request, UuidRequestId, X_REQUEST_ID};
pub use response::{Completion, Response};
pub use server::{HttpServer, ServerError};
