//! Not-found and error policies.
//!
//! # Responsibilities
//! - Write the response when no route matches
//! - Write the response when a middleware or handler fails
//!
//! # Design Decisions
//! - Policies are per-dispatcher values, never global
//! - The dispatcher logs the failure before the error policy runs, so a
//!   custom policy cannot hide it from operators

use std::fmt;
use std::sync::Arc;

use serde_json::json;

use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Responds to requests no route matched.
pub trait NotFoundHandler: Send + Sync + 'static {
    fn handle(&self, req: &Request, res: &mut Response) -> Result;
}

impl<F> NotFoundHandler for F
where
    F: Fn(&Request, &mut Response) -> Result + Send + Sync + 'static,
{
    fn handle(&self, req: &Request, res: &mut Response) -> Result {
        self(req, res)
    }
}

/// Responds to failed requests.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, err: &Error, req: &Request, res: &mut Response) -> Result;
}

impl<F> ErrorHandler for F
where
    F: Fn(&Error, &Request, &mut Response) -> Result + Send + Sync + 'static,
{
    fn handle(&self, err: &Error, req: &Request, res: &mut Response) -> Result {
        self(err, req, res)
    }
}

/// Default not-found response: 404 with `{"message","method","path"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNotFound;

impl NotFoundHandler for DefaultNotFound {
    fn handle(&self, req: &Request, res: &mut Response) -> Result {
        res.status(axum::http::StatusCode::NOT_FOUND).json(&json!({
            "message": "Not Found",
            "method": req.method().as_str(),
            "path": req.path(),
        }))
    }
}

/// Default error response: `Error::status()` with `{"message"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, err: &Error, _req: &Request, res: &mut Response) -> Result {
        res.status(err.status())
            .json(&json!({ "message": err.to_string() }))
    }
}

/// The pair of policies a dispatcher uses.
#[derive(Clone)]
pub struct Policies {
    pub not_found: Arc<dyn NotFoundHandler>,
    pub error: Arc<dyn ErrorHandler>,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            not_found: Arc::new(DefaultNotFound),
            error: Arc::new(DefaultErrorHandler),
        }
    }
}

impl fmt::Debug for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policies").finish_non_exhaustive()
    }
}
