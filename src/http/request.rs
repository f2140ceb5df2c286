//! Per-request input context.
//!
//! # Responsibilities
//! - Wrap the transport request (method, URL, headers, body stream)
//! - Parse the query string once, at ingestion
//! - Carry path parameters once a route is matched
//! - Hold the body produced by the body-parsing middleware
//!
//! # Design Decisions
//! - Header access is case-insensitive (`HeaderMap`)
//! - Duplicate query keys: last value wins
//! - The raw body stream can be taken once; parsed body stays `None` unless a
//!   parser ran

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{self, AsHeaderName, HeaderValue};
use axum::http::{Extensions, HeaderMap, Method, Uri, Version};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::routing::Params;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Query string parameters.
pub type Query = HashMap<String, String>;

/// Incoming request as seen by middleware and handlers.
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    url: String,
    query: Query,
    params: Params,
    route: Option<String>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Option<Value>,
    raw_body: Mutex<Option<Body>>,
    received_at: Instant,
}

impl Request {
    /// Wrap a transport request.
    pub fn from_http(request: axum::http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let query = parse_query(parts.uri.query());

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            url,
            query,
            params: Params::new(),
            route: None,
            headers: parts.headers,
            extensions: parts.extensions,
            body: None,
            raw_body: Mutex::new(Some(body)),
            received_at: Instant::now(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Request target as received: path plus query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Path parameters of the matched route (empty before matching).
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Template of the matched route, e.g. `/users/:id`.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn set_route_match(&mut self, template: &str, params: Params) {
        self.route = Some(template.to_string());
        self.params = params;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as text; lookup is case-insensitive.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Media type of the body without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.header(header::CONTENT_TYPE).map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header(header::CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Cookies from the `Cookie` header.
    pub fn cookies(&self) -> HashMap<String, String> {
        let mut cookies = HashMap::new();
        for value in self.headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            for pair in value.split(';') {
                if let Some((key, val)) = pair.split_once('=') {
                    cookies.insert(key.trim().to_string(), val.trim().to_string());
                }
            }
        }
        cookies
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    /// Look `field` up in headers, path params, query, cookies and finally
    /// string fields of the parsed body, in that order.
    pub fn lookup(&self, field: &str) -> Option<String> {
        let header_name = match field.to_ascii_lowercase().as_str() {
            "referrer" => "referer".to_string(),
            other => other.to_string(),
        };
        if let Some(value) = self.header(header_name.as_str()) {
            return Some(value.to_string());
        }
        if let Some(value) = self.param(field).or_else(|| self.query_param(field)) {
            return Some(value.to_string());
        }
        if let Some(value) = self.cookie(field) {
            return Some(value);
        }
        self.body
            .as_ref()
            .and_then(|body| body.get(field))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Peer address, when the transport recorded it.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    /// Parsed body, if a body parser ran.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    /// Deserialize the parsed body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.body.clone().unwrap_or(Value::Null);
        serde_json::from_value(body)
            .map_err(|e| Error::bad_request(format!("Invalid request body: {e}")))
    }

    /// Take the raw body stream. Returns `None` once taken.
    pub fn take_raw_body(&mut self) -> Option<Body> {
        match self.raw_body.get_mut() {
            Ok(body) => body.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("params", &self.params)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

fn parse_query(query: Option<&str>) -> Query {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Generates UUID v4 request IDs for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}
