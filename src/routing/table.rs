//! Route registration, mounting and lookup.
//!
//! # Responsibilities
//! - Keep routes in registration order
//! - Mount another table under a prefix, rewriting each template
//! - Return the first route accepting a method + path
//!
//! # Design Decisions
//! - Registration order is the only tie-breaker (earlier wins)
//! - Linear scan; tables are small and fixed once serving starts
//! - `build()` freezes the table into a `RouteSet` shared read-only across requests

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use super::handler::Handler;
use super::pattern::{Params, PathPattern};

/// Which request methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// Any method (`all`).
    Any,
    /// Exactly this method.
    Only(Method),
}

impl MethodFilter {
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => expected == method,
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        MethodFilter::Only(method)
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => f.write_str("*"),
            MethodFilter::Only(method) => f.write_str(method.as_str()),
        }
    }
}

/// A registered (method, pattern, handler) triple.
#[derive(Clone)]
pub struct Route {
    method: MethodFilter,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn new(method: MethodFilter, template: &str, handler: Arc<dyn Handler>) -> Self {
        Self {
            method,
            pattern: PathPattern::compile(template),
            handler,
        }
    }

    pub fn method(&self) -> &MethodFilter {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn template(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'r> {
    pub route: &'r Route,
    pub params: Params,
}

/// Append-only route table used while an application is being assembled.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `template` and append a route.
    pub fn register(&mut self, method: MethodFilter, template: &str, handler: Arc<dyn Handler>) {
        tracing::debug!(method = %method, template, "Route registered");
        self.routes.push(Route::new(method, template, handler));
    }

    /// Append every route of `sub`, in its order, under `prefix`.
    pub fn mount(&mut self, prefix: &str, sub: RouteTable) {
        for route in sub.routes {
            let template = join_paths(prefix, route.template());
            tracing::debug!(
                method = %route.method,
                prefix,
                template = %template,
                "Route mounted"
            );
            self.routes.push(Route::new(route.method, &template, route.handler));
        }
    }

    /// First route, in registration order, accepting `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        first_match(&self.routes, method, path)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the table for serving.
    pub fn build(self) -> RouteSet {
        tracing::info!(routes_count = self.routes.len(), "Routing table built");
        RouteSet {
            routes: self.routes.into(),
        }
    }
}

/// Immutable route table produced by [`RouteTable::build`].
#[derive(Debug, Clone)]
pub struct RouteSet {
    routes: Arc<[Route]>,
}

impl RouteSet {
    /// First route, in registration order, accepting `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        first_match(&self.routes, method, path)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn first_match<'r>(routes: &'r [Route], method: &Method, path: &str) -> Option<RouteMatch<'r>> {
    routes
        .iter()
        .filter(|route| route.method.accepts(method))
        .find_map(|route| {
            route
                .pattern
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
}

/// Concatenate a mount prefix and a route template.
///
/// `""`, `/` and `*` contribute nothing; separators are normalized so exactly
/// one `/` sits between the two parts. A template of `/` under a non-empty
/// prefix resolves to the prefix itself.
pub fn join_paths(prefix: &str, template: &str) -> String {
    let prefix = match prefix {
        "" | "/" | "*" => "",
        p => p.trim_end_matches('/'),
    };
    let template = if template.starts_with('/') {
        template.to_string()
    } else {
        format!("/{template}")
    };

    if prefix.is_empty() {
        return template;
    }

    let prefix = if prefix.starts_with('/') {
        prefix.to_string()
    } else {
        format!("/{prefix}")
    };

    if template == "/" {
        prefix
    } else {
        prefix + &template
    }
}
