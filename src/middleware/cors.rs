//! Cross-origin resource sharing.
//!
//! # Responsibilities
//! - Answer preflight (`OPTIONS`) requests
//! - Decorate allowed cross-origin responses with `Access-Control-*` headers
//! - Reject disallowed origins and methods with 403
//!
//! # Design Decisions
//! - Requests without an `Origin` header are not cross-origin and pass through
//! - Preflight checks `Access-Control-Request-Method` when present
//! - Header values are rendered once, at construction

use std::fmt;
use std::sync::Arc;

use axum::http::header::{self, HeaderValue};
use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use serde_json::json;

use super::{Middleware, Next};
use crate::config::CorsConfig;
use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Custom origin check. Returning `true` allows the origin.
pub type OriginValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// CORS middleware.
#[derive(Clone)]
pub struct Cors {
    any_origin: bool,
    origins: Vec<String>,
    any_method: bool,
    methods: Vec<Method>,
    validator: Option<OriginValidator>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    credentials: bool,
    max_age: HeaderValue,
    success_status: StatusCode,
    preflight_continue: bool,
    error_message: String,
}

impl Cors {
    /// Build the middleware from configuration.
    pub fn from_config(config: &CorsConfig) -> Result<Self> {
        let any_origin = config.origins.iter().any(|o| o == "*");
        let any_method = config.methods.iter().any(|m| m == "*");
        let methods = config
            .methods
            .iter()
            .filter(|m| m.as_str() != "*")
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| Error::other(format!("invalid CORS method '{m}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        let success_status = StatusCode::from_u16(config.options_success_status).map_err(|_| {
            Error::other(format!(
                "invalid preflight status {}",
                config.options_success_status
            ))
        })?;
        let expose_headers = if config.exposed_headers.is_empty() {
            None
        } else {
            Some(list_value(&config.exposed_headers)?)
        };

        Ok(Self {
            any_origin,
            origins: config.origins.clone(),
            any_method,
            methods,
            validator: None,
            allow_methods: list_value(&config.methods)?,
            allow_headers: list_value(&config.headers)?,
            expose_headers,
            credentials: config.credentials,
            max_age: HeaderValue::from(config.max_age),
            success_status,
            preflight_continue: config.preflight_continue,
            error_message: config.error_message.clone(),
        })
    }

    /// Add a custom origin check, consulted before the origin list.
    pub fn with_origin_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.validator.as_ref().is_some_and(|check| check(origin))
            || self.any_origin
            || self.origins.iter().any(|o| o == origin)
    }

    pub fn method_allowed(&self, method: &Method) -> bool {
        self.any_method || self.methods.contains(method)
    }

    fn decorate(&self, origin: &str, res: &mut Response) -> Result {
        let allow_origin = if self.any_origin {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(origin).map_err(Error::other)?
        };
        res.set_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin)
            .set_header(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone())
            .set_header(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone())
            .set_header(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        if self.credentials {
            res.set_header(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(expose) = &self.expose_headers {
            res.set_header(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
        if !self.any_origin {
            res.set_header(header::VARY, HeaderValue::from_static("Origin"));
        }
        Ok(())
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            any_origin: true,
            origins: vec!["*".to_string()],
            any_method: false,
            methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            validator: None,
            allow_methods: HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS"),
            allow_headers: HeaderValue::from_static("Content-Type,Authorization"),
            expose_headers: None,
            credentials: false,
            max_age: HeaderValue::from_static("86400"),
            success_status: StatusCode::NO_CONTENT,
            preflight_continue: false,
            error_message: CorsConfig::default().error_message,
        }
    }
}

impl fmt::Debug for Cors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cors")
            .field("origins", &self.origins)
            .field("methods", &self.methods)
            .field("credentials", &self.credentials)
            .field("has_validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

impl Middleware for Cors {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let Some(origin) = req.header(header::ORIGIN).map(str::to_string) else {
                return next.run(req, res).await;
            };

            let preflight = req.method() == Method::OPTIONS;
            let method = if preflight {
                req.header(header::ACCESS_CONTROL_REQUEST_METHOD)
                    .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
                    .unwrap_or(Method::OPTIONS)
            } else {
                req.method().clone()
            };

            if !self.origin_allowed(&origin) || !self.method_allowed(&method) {
                tracing::debug!(origin = %origin, method = %method, "CORS request rejected");
                return res
                    .status(StatusCode::FORBIDDEN)
                    .json(&json!({ "error": self.error_message }));
            }

            self.decorate(&origin, res)?;

            if preflight && !self.preflight_continue {
                res.set_header(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                return res.status(self.success_status).end();
            }
            next.run(req, res).await
        })
    }
}

fn list_value(items: &[String]) -> Result<HeaderValue> {
    HeaderValue::from_str(&items.join(",")).map_err(Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{from_fn, ChainOutcome, MiddlewareChain};
    use crate::routing::Handler;
    use axum::body::Body;

    struct Ok200;

    impl Handler for Ok200 {
        fn call<'a>(&'a self, _req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Result> {
            Box::pin(async move { res.send("ok") })
        }
    }

    fn request(method: Method, origin: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri("/data");
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        Request::from_http(builder.body(Body::empty()).unwrap())
    }

    async fn run(cors: Cors, mut req: Request) -> (ChainOutcome, Response) {
        let mut chain = MiddlewareChain::new();
        chain.push(cors);
        let mut res = Response::new();
        let outcome = chain.execute(&mut req, &mut res, &Ok200).await;
        (outcome, res)
    }

    fn restricted() -> Cors {
        Cors::from_config(&CorsConfig {
            enabled: true,
            origins: vec!["https://app.example.com".to_string()],
            credentials: true,
            exposed_headers: vec!["X-Total".to_string()],
            ..CorsConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn same_origin_requests_pass_through() {
        let (outcome, res) = run(restricted(), request(Method::GET, None)).await;
        assert!(matches!(outcome, ChainOutcome::Completed));
        assert!(res.header(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn allowed_origin_is_decorated() {
        let (outcome, res) = run(
            restricted(),
            request(Method::GET, Some("https://app.example.com")),
        )
        .await;
        assert!(matches!(outcome, ChainOutcome::Completed));
        assert_eq!(
            res.header(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
        assert_eq!(res.header(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert_eq!(res.header(header::ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(), "X-Total");
        assert_eq!(res.header(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "86400");
        assert_eq!(res.body().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn wildcard_origin_answers_star() {
        let (_, res) = run(Cors::default(), request(Method::POST, Some("https://x.test"))).await;
        assert_eq!(res.header(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            res.header(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET,POST,PUT,DELETE,OPTIONS"
        );
    }

    #[tokio::test]
    async fn disallowed_origin_is_forbidden() {
        let (outcome, res) = run(restricted(), request(Method::GET, Some("https://evil.test"))).await;
        assert!(matches!(outcome, ChainOutcome::Halted));
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["error"], CorsConfig::default().error_message);
    }

    #[tokio::test]
    async fn disallowed_method_is_forbidden() {
        let (_, res) = run(Cors::default(), request(Method::PATCH, Some("https://x.test"))).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn preflight_short_circuits_with_success_status() {
        let mut req = request(Method::OPTIONS, Some("https://app.example.com"));
        req.headers_mut().insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("PUT"),
        );
        let (outcome, res) = run(restricted(), req).await;

        assert!(matches!(outcome, ChainOutcome::Halted));
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(res.header(header::CONTENT_LENGTH).unwrap(), "0");
        assert!(res.body().is_empty());
    }

    #[tokio::test]
    async fn preflight_can_continue() {
        let cors = Cors::from_config(&CorsConfig {
            preflight_continue: true,
            ..CorsConfig::default()
        })
        .unwrap();
        let (outcome, res) = run(cors, request(Method::OPTIONS, Some("https://x.test"))).await;
        assert!(matches!(outcome, ChainOutcome::Completed));
        assert_eq!(res.body().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn validator_can_allow_unlisted_origins() {
        let cors = restricted().with_origin_validator(|origin| origin.ends_with(".internal"));
        let (outcome, res) = run(cors, request(Method::GET, Some("https://svc.internal"))).await;
        assert!(matches!(outcome, ChainOutcome::Completed));
        assert_eq!(
            res.header(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://svc.internal"
        );
    }

    #[tokio::test]
    async fn runs_before_later_middleware() {
        let mut chain = MiddlewareChain::new();
        chain.push(restricted());
        chain.push(from_fn(|req, res, next| {
            Box::pin(async move {
                assert!(res.header(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_some());
                next.run(req, res).await
            })
        }));
        let mut req = request(Method::GET, Some("https://app.example.com"));
        let mut res = Response::new();
        let outcome = chain.execute(&mut req, &mut res, &Ok200).await;
        assert!(matches!(outcome, ChainOutcome::Completed));
    }
}
