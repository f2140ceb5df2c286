//! Application builder.
//!
//! # Responsibilities
//! - Collect routes, middleware, mounted routers and policies
//! - Freeze them into a `Dispatcher`
//! - Bind and serve until a shutdown signal
//!
//! # Design Decisions
//! - Everything is registered up front; `build()` consumes the `App`, so the
//!   route table cannot change once serving starts
//! - Middleware runs in registration order, before routing
//! - Mounted routers contribute routes only; their prefix is baked into each
//!   route template

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;

use crate::dispatcher::{Dispatcher, ErrorHandler, NotFoundHandler, Policies};
use crate::error::{Error, Result};
use crate::http::server::{HttpServer, ServerError, DEFAULT_MAX_CONCURRENT_REQUESTS};
use crate::http::{Request, Response};
use crate::lifecycle::signals::shutdown_signal;
use crate::middleware::{from_fn, Middleware, MiddlewareChain, Next, Prefixed};
use crate::routing::{Handler, MethodFilter, Router, RouteTable};

/// What `App::using` registers.
pub enum UseKind {
    /// Middleware for every request.
    Middleware(Arc<dyn Middleware>),
    /// Middleware for paths equal to or below `prefix`.
    Prefixed {
        prefix: String,
        middleware: Arc<dyn Middleware>,
    },
    /// Routes of `router`, mounted under `prefix`.
    Router { prefix: String, router: Router },
}

impl From<Router> for UseKind {
    fn from(router: Router) -> Self {
        UseKind::Router {
            prefix: "/".to_string(),
            router,
        }
    }
}

impl fmt::Debug for UseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UseKind::Middleware(_) => f.write_str("Middleware"),
            UseKind::Prefixed { prefix, .. } => f.debug_struct("Prefixed").field("prefix", prefix).finish(),
            UseKind::Router { prefix, router } => f
                .debug_struct("Router")
                .field("prefix", prefix)
                .field("routes", &router.table().len())
                .finish(),
        }
    }
}

/// A rapidfy application.
pub struct App {
    routes: RouteTable,
    chain: MiddlewareChain,
    policies: Policies,
    max_concurrent_requests: usize,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            routes: RouteTable::new(),
            chain: MiddlewareChain::new(),
            policies: Policies::default(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    pub fn get<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result> + Send + Sync + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn post<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result> + Send + Sync + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    pub fn put<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result> + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    pub fn delete<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    pub fn patch<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, path, handler)
    }

    /// Register a handler for every method.
    pub fn all<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result> + Send + Sync + 'static,
    {
        self.route(MethodFilter::Any, path, handler)
    }

    /// Register any [`Handler`] for `method`.
    pub fn route<H>(&mut self, method: impl Into<MethodFilter>, path: &str, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        self.routes.register(method.into(), path, Arc::new(handler));
        self
    }

    /// Register middleware, a prefixed middleware, or a mounted router.
    pub fn using(&mut self, kind: impl Into<UseKind>) -> &mut Self {
        match kind.into() {
            UseKind::Middleware(middleware) => {
                self.chain.push_arc(middleware);
            }
            UseKind::Prefixed { prefix, middleware } => {
                self.chain.push(Prefixed::new(&prefix, middleware));
            }
            UseKind::Router { prefix, router } => {
                self.routes.mount(&prefix, router.into_table());
            }
        }
        self
    }

    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.using(UseKind::Middleware(Arc::new(middleware)))
    }

    /// Register a closure as middleware.
    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result>
            + Send
            + Sync
            + 'static,
    {
        self.use_middleware(from_fn(f))
    }

    /// Register middleware that only runs for paths equal to or below `prefix`.
    pub fn use_at<M: Middleware>(&mut self, prefix: &str, middleware: M) -> &mut Self {
        self.using(UseKind::Prefixed {
            prefix: prefix.to_string(),
            middleware: Arc::new(middleware),
        })
    }

    /// Mount `router`'s routes under `prefix`.
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.using(UseKind::Router {
            prefix: prefix.to_string(),
            router,
        })
    }

    /// Mount `router`'s routes at the root.
    pub fn merge(&mut self, router: Router) -> &mut Self {
        self.using(router)
    }

    /// Replace the not-found policy.
    pub fn not_found<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) -> Result + Send + Sync + 'static,
    {
        self.policies.not_found = Arc::new(f);
        self
    }

    /// Replace the error policy.
    pub fn on_error<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Error, &Request, &mut Response) -> Result + Send + Sync + 'static,
    {
        self.policies.error = Arc::new(f);
        self
    }

    /// Replace both policies with trait objects.
    pub fn policies(
        &mut self,
        not_found: Arc<dyn NotFoundHandler>,
        error: Arc<dyn ErrorHandler>,
    ) -> &mut Self {
        self.policies = Policies { not_found, error };
        self
    }

    /// Bound the number of requests served at once by `listen`.
    pub fn concurrency_limit(&mut self, max: usize) -> &mut Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Freeze routes, middleware and policies.
    pub fn build(self) -> Dispatcher {
        Dispatcher::new(self.routes.build(), self.chain, self.policies)
    }

    /// Build an `HttpServer` for this application.
    pub fn into_server(self) -> HttpServer {
        let limit = self.max_concurrent_requests;
        HttpServer::new(self.build()).with_concurrency_limit(limit)
    }

    /// Bind `address`, call `on_listening` with the bound address, and serve
    /// until Ctrl+C or SIGTERM.
    pub async fn listen<F>(self, address: &str, on_listening: F) -> std::result::Result<(), ServerError>
    where
        F: FnOnce(SocketAddr),
    {
        let listener = HttpServer::bind(address).await?;
        let local = listener.local_addr()?;
        on_listening(local);
        self.into_server()
            .run_with_shutdown(listener, shutdown_signal())
            .await
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes.len())
            .field("middleware", &self.chain.len())
            .finish_non_exhaustive()
    }
}
