//! Middleware chain.
//!
//! # Data Flow
//! ```text
//! MiddlewareChain::execute(req, res, endpoint)
//!     → middleware[0].handle(req, res, next)
//!         → next.run(req, res) → middleware[1] → ... → endpoint
//!     ← Ok(()) / Err(error) unwinds back through each middleware
//!     → ChainOutcome::Completed | Halted | Failed(error)
//! ```
//!
//! # Design Decisions
//! - `Next` is consumed by `run`, so a middleware continues at most once
//! - A middleware that returns without calling `next.run` halts the chain
//! - `Err` skips everything downstream; panics are caught and become `Err`
//! - Continuing after the response was sent is a logged no-op

pub mod body;
pub mod cors;
pub mod logger;
pub mod timeout;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::routing::Handler;

pub use body::BodyParser;
pub use cors::Cors;
pub use logger::RequestLogger;
pub use timeout::Timeout;

/// Cross-cutting request processing step.
///
/// Implement this for middleware with configuration; wrap plain closures
/// with [`from_fn`].
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result>;
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FromFn<F> {
    f: F,
}

/// Turn a closure into middleware:
///
/// ```ignore
/// from_fn(|req, res, next| Box::pin(async move {
///     res.set_header("x-powered-by", HeaderValue::from_static("rapidfy"));
///     next.run(req, res).await
/// }))
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result>
        + Send
        + Sync
        + 'static,
{
    FromFn { f }
}

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result>
        + Send
        + Sync
        + 'static,
{
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        (self.f)(req, res, next)
    }
}

/// Continuation into the rest of the chain.
///
/// Consumed by [`Next::run`]; dropping it without running halts the chain.
pub struct Next<'a> {
    index: usize,
    stack: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Run the remaining middleware and then the endpoint.
    pub fn run<'r>(self, req: &'r mut Request, res: &'r mut Response) -> BoxFuture<'r, Result>
    where
        'a: 'r,
    {
        Box::pin(async move {
            if res.is_sent() {
                tracing::warn!(
                    index = self.index,
                    path = %req.path(),
                    "Continuation invoked after response was sent; ignoring"
                );
                return Ok(());
            }

            match self.stack.split_first() {
                Some((middleware, rest)) => {
                    tracing::trace!(index = self.index, "Running middleware");
                    let next = Next {
                        index: self.index + 1,
                        stack: rest,
                        endpoint: self.endpoint,
                    };
                    guarded(Box::pin(async move {
                        middleware.handle(req, res, next).await
                    }))
                    .await
                }
                None => {
                    let endpoint = self.endpoint;
                    guarded(Box::pin(async move { endpoint.call(req, res).await })).await
                }
            }
        })
    }
}

/// Poll `fut` with panics converted into `Error::Panic`. The future must
/// build the step lazily so a panic raised before the step returns its own
/// future is caught too.
async fn guarded(fut: BoxFuture<'_, Result>) -> Result {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Error::from_panic(payload)),
    }
}

/// How a chain execution ended. Exactly one is produced per execution.
#[derive(Debug)]
pub enum ChainOutcome {
    /// Every middleware continued and the endpoint returned `Ok`.
    Completed,
    /// A middleware returned without continuing.
    Halted,
    /// A middleware or the endpoint failed.
    Failed(Error),
}

/// Ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stack: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.stack.push(Arc::new(middleware));
        self
    }

    pub fn push_arc(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.stack.push(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Run the chain with `endpoint` as the innermost step.
    pub async fn execute(
        &self,
        req: &mut Request,
        res: &mut Response,
        endpoint: &dyn Handler,
    ) -> ChainOutcome {
        let endpoint = Tracked {
            inner: endpoint,
            reached: AtomicBool::new(false),
        };
        let next = Next {
            index: 0,
            stack: &self.stack,
            endpoint: &endpoint,
        };

        match next.run(req, res).await {
            Err(err) => ChainOutcome::Failed(err),
            Ok(()) if endpoint.reached.load(Ordering::Acquire) => ChainOutcome::Completed,
            Ok(()) => ChainOutcome::Halted,
        }
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.stack.len())
            .finish()
    }
}

/// Endpoint wrapper recording whether the chain reached it.
struct Tracked<'e> {
    inner: &'e dyn Handler,
    reached: AtomicBool,
}

impl Handler for Tracked<'_> {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Result> {
        self.reached.store(true, Ordering::Release);
        self.inner.call(req, res)
    }
}

/// Runs `inner` only for paths equal to or below `prefix`.
pub struct Prefixed {
    prefix: String,
    inner: Arc<dyn Middleware>,
}

impl Prefixed {
    pub fn new(prefix: &str, inner: Arc<dyn Middleware>) -> Self {
        let prefix = match prefix {
            "" | "/" | "*" => String::new(),
            p => format!("/{}", p.trim_matches('/')),
        };
        Self { prefix, inner }
    }

    pub fn applies_to(&self, path: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl Middleware for Prefixed {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        if self.applies_to(req.path()) {
            self.inner.handle(req, res, next)
        } else {
            next.run(req, res)
        }
    }
}
