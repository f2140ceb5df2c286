//! Error taxonomy for request processing.
//!
//! # Responsibilities
//! - One error type for everything that can fail while a request is dispatched
//! - Map each failure to the status code the error funnel responds with
//! - Turn caught panics into ordinary errors
//!
//! # Design Decisions
//! - A failed route lookup is not an error (it is `None` from the table)
//! - Errors that carry their own status keep it verbatim; everything else is 500

use std::any::Any;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Result alias used by handlers and middleware.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Errors raised by middleware, handlers, or the framework itself.
#[derive(Debug, Error)]
pub enum Error {
    /// Failure with an explicit status code and client-facing message.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// A middleware or handler panicked.
    #[error("{0}")]
    Panic(String),

    /// The request did not finish within the configured deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A terminal write was attempted after the response was already sent.
    #[error("response already sent")]
    ResponseSent,

    /// Response body serialization failed.
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Any other failure.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create an error that responds with `status` and `message`.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::http(StatusCode::BAD_REQUEST, message)
    }

    /// Wrap an arbitrary error (or message) as an internal failure.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Other(err.into())
    }

    /// Status code the default error policy responds with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Http { status, .. } => *status,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build an error from a payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Error::Panic(message)
    }
}
