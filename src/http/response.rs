//! Per-request output sink.
//!
//! # Responsibilities
//! - Collect status, headers and body for one request
//! - Enforce a single terminal write
//! - Run completion hooks once the response is finalized
//!
//! # Design Decisions
//! - Status defaults to 200 until set
//! - After the terminal write, status/header changes are ignored (logged) and
//!   further terminal writes fail with `Error::ResponseSent`
//! - Content-Type is only filled in when the caller has not set one

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use axum::body::{Body, Bytes};
use axum::http::header::{self, AsHeaderName, HeaderValue, IntoHeaderName};
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::error::{Error, Result};

/// What a completion hook observes.
#[derive(Debug, Clone)]
pub struct Completion {
    pub status: StatusCode,
    /// Template of the matched route, if any.
    pub route: Option<String>,
    pub content_length: usize,
    pub headers: HeaderMap,
}

type FinishHook = Box<dyn FnOnce(&Completion) + Send + Sync>;

/// Outgoing response being built by middleware and handlers.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    sent: bool,
    on_finish: Vec<FinishHook>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            sent: false,
            on_finish: Vec::new(),
        }
    }

    /// Whether the terminal write already happened.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Set the status code. Ignored once the response is sent.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        if self.sent {
            tracing::warn!(status = %status, "Status change after response was sent ignored");
        } else {
            self.status = status;
        }
        self
    }

    /// Set a header, replacing existing values. Ignored once the response is sent.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> &mut Self {
        if self.sent {
            tracing::warn!("Header change after response was sent ignored");
        } else {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body written so far (empty until the terminal write).
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serialize `value` as JSON and end the response.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result {
        self.ensure_open()?;
        let body = serde_json::to_vec(value)?;
        self.default_content_type("application/json");
        self.write(body.into())
    }

    /// Send a text body and end the response.
    pub fn send(&mut self, body: impl Into<String>) -> Result {
        self.ensure_open()?;
        self.default_content_type("text/plain");
        self.write(Bytes::from(body.into()))
    }

    /// Send a binary body and end the response.
    pub fn send_bytes(&mut self, body: impl Into<Bytes>) -> Result {
        self.ensure_open()?;
        self.default_content_type("application/octet-stream");
        self.write(body.into())
    }

    /// Set `status` and send its reason phrase as the body.
    pub fn send_status(&mut self, status: StatusCode) -> Result {
        self.ensure_open()?;
        self.status = status;
        let text = status.canonical_reason().unwrap_or(status.as_str()).to_string();
        self.send(text)
    }

    /// Redirect to `location` with 302 Found.
    pub fn redirect(&mut self, location: &str) -> Result {
        self.ensure_open()?;
        let value = HeaderValue::from_str(location)
            .map_err(|_| Error::other(format!("invalid redirect location: {location}")))?;
        self.status = StatusCode::FOUND;
        self.headers.insert(header::LOCATION, value);
        self.write(Bytes::new())
    }

    /// End the response without a body.
    pub fn end(&mut self) -> Result {
        self.ensure_open()?;
        self.write(Bytes::new())
    }

    /// Register a hook that runs once the response is finalized.
    pub fn on_finish<F>(&mut self, hook: F)
    where
        F: FnOnce(&Completion) + Send + Sync + 'static,
    {
        self.on_finish.push(Box::new(hook));
    }

    /// Run completion hooks and convert into a transport response.
    pub(crate) fn finish(mut self, route: Option<&str>) -> axum::http::Response<Body> {
        self.sent = true;

        let completion = Completion {
            status: self.status,
            route: route.map(str::to_string),
            content_length: self.body.len(),
            headers: self.headers.clone(),
        };
        for hook in self.on_finish.drain(..) {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(&completion))) {
                let err = Error::from_panic(payload);
                tracing::error!(
                    error = %err,
                    status = completion.status.as_u16(),
                    "Completion hook panicked"
                );
            }
        }

        let mut response = axum::http::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    fn ensure_open(&self) -> Result {
        if self.sent {
            Err(Error::ResponseSent)
        } else {
            Ok(())
        }
    }

    fn default_content_type(&mut self, value: &'static str) {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }

    fn write(&mut self, body: Bytes) -> Result {
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = body;
        self.sent = true;
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("sent", &self.sent)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;

    #[test]
    fn defaults_to_200_and_unsent() {
        let res = Response::new();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(!res.is_sent());
    }

    #[test]
    fn json_sets_content_type_and_length() {
        let mut res = Response::new();
        res.status(StatusCode::CREATED)
            .json(&serde_json::json!({ "ok": true }))
            .unwrap();

        assert!(res.is_sent());
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("content-type").unwrap(), "application/json");
        assert_eq!(res.header("content-length").unwrap(), "11");
        assert_eq!(res.body().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn existing_content_type_is_kept() {
        let mut res = Response::new();
        res.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        res.send("<p>hi</p>").unwrap();
        assert_eq!(res.header(header::CONTENT_TYPE).unwrap(), "text/html");
    }

    #[test]
    fn writes_after_send_are_rejected() {
        let mut res = Response::new();
        res.send("first").unwrap();

        assert!(matches!(res.send("second"), Err(Error::ResponseSent)));
        assert!(matches!(res.end(), Err(Error::ResponseSent)));

        res.status(StatusCode::IM_A_TEAPOT);
        res.set_header("x-late", HeaderValue::from_static("1"));
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.header("x-late").is_none());
        assert_eq!(res.body().as_ref(), b"first");
    }

    #[test]
    fn send_status_uses_reason_phrase() {
        let mut res = Response::new();
        res.send_status(StatusCode::NOT_FOUND).unwrap();
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"Not Found");
    }

    #[test]
    fn redirect_sets_location() {
        let mut res = Response::new();
        res.redirect("https://example.com").unwrap();
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.header(header::LOCATION).unwrap(), "https://example.com");
    }

    #[test]
    fn finish_runs_hooks_with_final_state() {
        let seen = Arc::new(AtomicU16::new(0));
        let observed = Arc::clone(&seen);

        let mut res = Response::new();
        res.on_finish(move |c| observed.store(c.status.as_u16(), Ordering::SeqCst));
        res.status(StatusCode::ACCEPTED).send("queued").unwrap();

        let response = res.finish(Some("/jobs"));
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(seen.load(Ordering::SeqCst), 202);
    }

    #[test]
    fn panicking_hook_does_not_stop_later_hooks() {
        let seen = Arc::new(AtomicU16::new(0));
        let observed = Arc::clone(&seen);

        let mut res = Response::new();
        res.on_finish(|_| panic!("audit sink unavailable"));
        res.on_finish(move |c| observed.store(c.status.as_u16(), Ordering::SeqCst));
        res.status(StatusCode::CREATED).send("stored").unwrap();

        let response = res.finish(None);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(seen.load(Ordering::SeqCst), 201);
    }
}
