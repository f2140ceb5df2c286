//! Sub-router registration surface.
//!
//! A `Router` is a standalone group of routes that an application (or another
//! router) mounts under a prefix.

use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;

use super::handler::Handler;
use super::table::{MethodFilter, RouteTable};
use crate::error::Result;
use crate::http::{Request, Response};

/// A mountable group of routes.
#[derive(Debug, Clone, Default)]
pub struct Router {
    table: RouteTable,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
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
        self.table.register(method.into(), path, Arc::new(handler));
        self
    }

    /// Nest `router` under `prefix`.
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.table.mount(prefix, router.table);
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn into_table(self) -> RouteTable {
        self.table
    }
}
