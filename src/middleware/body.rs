//! Request body parsing.
//!
//! # Responsibilities
//! - Buffer the raw body up to a size limit
//! - Decode JSON and url-encoded bodies into `Request::body`
//!
//! # Design Decisions
//! - A declared `Content-Length` over the limit is rejected before reading
//! - Unknown content types (and an empty JSON body) parse to `{}`
//! - Failures go through the error funnel as `Error::Http`

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use serde_json::{Map, Value};

use super::{Middleware, Next};
use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Default body size limit (1 MiB).
pub const DEFAULT_LIMIT: usize = 1024 * 1024;

/// Body parser middleware.
#[derive(Debug, Clone)]
pub struct BodyParser {
    limit: usize,
}

impl Default for BodyParser {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl BodyParser {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    async fn parse(&self, req: &mut Request) -> Result {
        if let Some(length) = req.content_length() {
            if length > self.limit as u64 {
                return Err(too_large(self.limit));
            }
        }

        let Some(raw) = req.take_raw_body() else {
            return Ok(());
        };
        let mut bytes = Vec::new();
        let mut stream = raw.into_data_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::bad_request(format!("Error parsing body: {e}")))?;
            if bytes.len() + chunk.len() > self.limit {
                return Err(too_large(self.limit));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = match req.content_type().as_deref() {
            Some("application/json") => parse_json(&bytes)?,
            Some("application/x-www-form-urlencoded") => parse_form(&bytes),
            _ => Value::Object(Map::new()),
        };
        tracing::trace!(bytes = bytes.len(), "Request body parsed");
        req.set_body(body);
        Ok(())
    }
}

impl Middleware for BodyParser {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            self.parse(req).await?;
            next.run(req, res).await
        })
    }
}

fn too_large(limit: usize) -> Error {
    Error::http(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("Request body exceeds {limit} bytes"),
    )
}

fn parse_json(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| Error::bad_request(format!("Error parsing body: {e}")))
}

fn parse_form(bytes: &[u8]) -> Value {
    let fields: Map<String, Value> = url::form_urlencoded::parse(bytes)
        .into_owned()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    Value::Object(fields)
}
