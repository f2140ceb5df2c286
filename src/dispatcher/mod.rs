//! Per-request orchestration.
//!
//! # Data Flow
//! ```text
//! http::Request<Body>
//!     → Request / Response contexts
//!     → MiddlewareChain::execute(req, res, RouteStage)
//!         RouteStage: RouteSet::lookup(method, path)
//!             → match: record params + template, call handler
//!             → none: NotFound policy
//!     → ChainOutcome
//!         Completed → as written
//!         Halted    → as written (warn if nothing was sent)
//!         Failed(e) → log, Error policy (unless already sent),
//!                     default error response if the policy did not send
//!     → Response::finish (completion hooks) → http::Response<Body>
//! ```
//!
//! # Design Decisions
//! - The dispatcher is immutable and shared through `Arc` across requests
//! - Handler errors and panics travel the same funnel as middleware errors

pub mod policy;

use std::panic::{self, AssertUnwindSafe};

use axum::body::Body;
use futures_util::future::BoxFuture;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::middleware::{ChainOutcome, MiddlewareChain};
use crate::routing::{Handler, RouteSet};

pub use policy::{DefaultErrorHandler, DefaultNotFound, ErrorHandler, NotFoundHandler, Policies};

/// Innermost chain step: route lookup and handler invocation.
struct RouteStage<'d> {
    routes: &'d RouteSet,
    not_found: &'d dyn NotFoundHandler,
}

impl Handler for RouteStage<'_> {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let Some(matched) = self.routes.lookup(req.method(), req.path()) else {
                tracing::debug!(method = %req.method(), path = %req.path(), "No route matched");
                return self.not_found.handle(req, res);
            };

            tracing::trace!(route = %matched.route.template(), "Route matched");
            req.set_route_match(matched.route.template(), matched.params);
            matched.route.handler().call(req, res).await
        })
    }
}

/// Routes, middleware and policies of one application.
#[derive(Debug)]
pub struct Dispatcher {
    routes: RouteSet,
    chain: MiddlewareChain,
    policies: Policies,
}

impl Dispatcher {
    pub fn new(routes: RouteSet, chain: MiddlewareChain, policies: Policies) -> Self {
        Self {
            routes,
            chain,
            policies,
        }
    }

    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    pub fn chain(&self) -> &MiddlewareChain {
        &self.chain
    }

    /// Serve one transport request.
    pub async fn dispatch(&self, request: axum::http::Request<Body>) -> axum::http::Response<Body> {
        let mut req = Request::from_http(request);
        let mut res = Response::new();
        self.handle(&mut req, &mut res).await;
        res.finish(req.route())
    }

    /// Run the middleware chain and routing on already-built contexts.
    pub async fn handle(&self, req: &mut Request, res: &mut Response) {
        let stage = RouteStage {
            routes: &self.routes,
            not_found: self.policies.not_found.as_ref(),
        };

        match self.chain.execute(req, res, &stage).await {
            ChainOutcome::Completed => {
                if !res.is_sent() {
                    tracing::debug!(path = %req.path(), "Handler finished without responding");
                }
            }
            ChainOutcome::Halted => {
                if !res.is_sent() {
                    tracing::warn!(path = %req.path(), "Middleware halted without responding");
                }
            }
            ChainOutcome::Failed(err) => {
                tracing::error!(
                    error = %err,
                    method = %req.method(),
                    path = %req.path(),
                    request_id = req.request_id().unwrap_or("-"),
                    "Request failed"
                );
                if res.is_sent() {
                    tracing::warn!(path = %req.path(), "Response already sent; error not written");
                } else {
                    self.write_error(&err, req, res);
                }
            }
        }
    }

    /// Run the error policy, falling back to `DefaultErrorHandler` when the
    /// policy fails, panics or leaves the response unsent.
    fn write_error(&self, err: &Error, req: &Request, res: &mut Response) {
        let policy = self.policies.error.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| policy.handle(err, req, res))) {
            Ok(Ok(())) => {}
            Ok(Err(policy_err)) => {
                tracing::error!(error = %policy_err, path = %req.path(), "Error policy failed");
            }
            Err(payload) => {
                let policy_err = Error::from_panic(payload);
                tracing::error!(error = %policy_err, path = %req.path(), "Error policy panicked");
            }
        }

        if res.is_sent() {
            return;
        }
        tracing::warn!(path = %req.path(), "Error policy left the response unsent; using default");
        if let Err(fallback_err) = DefaultErrorHandler.handle(err, req, res) {
            tracing::error!(error = %fallback_err, "Default error response failed");
        }
    }
}
