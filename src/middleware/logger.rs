//! Access logging.
//!
//! # Responsibilities
//! - Log one line per finished request in a chosen format
//! - Record request metrics
//!
//! # Design Decisions
//! - The line is emitted from a completion hook, so it sees the final status
//!   even when a later middleware or the error funnel wrote the response
//! - Timestamps come from the tracing subscriber, not the line itself
//! - Status >= 400 logs at `warn`, everything else at `info`

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use axum::http::{header, Version};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{Middleware, Next};
use crate::error::Result;
use crate::http::{Completion, Request, Response};
use crate::observability::metrics;

/// Access log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `remote - - "METHOD url HTTP/x" status length - ms ms "agent"`
    Combined,
    /// `METHOD url status ms ms`
    Short,
    /// `METHOD url status ms ms - length bytes`
    Long,
    /// `METHOD url status - ms ms`
    Tiny,
    #[default]
    Dev,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "combined" => Ok(LogFormat::Combined),
            "short" => Ok(LogFormat::Short),
            "long" => Ok(LogFormat::Long),
            "tiny" => Ok(LogFormat::Tiny),
            "dev" => Ok(LogFormat::Dev),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Combined => "combined",
            LogFormat::Short => "short",
            LogFormat::Long => "long",
            LogFormat::Tiny => "tiny",
            LogFormat::Dev => "dev",
        };
        f.write_str(name)
    }
}

/// What the access log knows about a request once it finished.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub method: String,
    pub url: String,
    pub version: Version,
    pub remote: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub status: u16,
    pub content_length: usize,
    pub elapsed_ms: f64,
}

impl AccessRecord {
    /// Render the record in `format`.
    pub fn render(&self, format: LogFormat) -> String {
        let (m, url, status, ms) = (&self.method, &self.url, self.status, self.elapsed_ms);
        match format {
            LogFormat::Combined => format!(
                "{remote} - - \"{m} {url} {version:?}\" {status} {len} - {ms:.3} ms \"{ua}\"",
                remote = self.remote.as_deref().unwrap_or("-"),
                version = self.version,
                len = self.content_length,
                ua = self.user_agent.as_deref().unwrap_or("-"),
            ),
            LogFormat::Short => format!("{m} {url} {status} {ms:.3} ms"),
            LogFormat::Long | LogFormat::Dev => {
                format!("{m} {url} {status} {ms:.3} ms - {} bytes", self.content_length)
            }
            LogFormat::Tiny => format!("{m} {url} {status} - {ms:.3} ms"),
        }
    }
}

/// Request logger middleware.
#[derive(Debug, Clone, Default)]
pub struct RequestLogger {
    format: LogFormat,
    production: bool,
}

impl RequestLogger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            production: false,
        }
    }

    /// In production mode the logger passes requests through untouched.
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl Middleware for RequestLogger {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        if self.production {
            return next.run(req, res);
        }

        let started = Instant::now();
        let format = self.format;
        let method = req.method().to_string();
        let url = req.url().to_string();
        let version = req.version();
        let remote = req.remote_addr().map(|addr| addr.ip().to_string());
        let user_agent = req.header(header::USER_AGENT).map(str::to_string);
        let request_id = req.request_id().map(str::to_string);

        res.on_finish(move |completion: &Completion| {
            let record = AccessRecord {
                method,
                url,
                version,
                remote,
                user_agent,
                request_id,
                status: completion.status.as_u16(),
                content_length: completion.content_length,
                elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            };
            emit(&record, format);
            metrics::record_request(
                &record.method,
                record.status,
                completion.route.as_deref(),
                started.elapsed(),
            );
        });

        next.run(req, res)
    }
}

fn emit(record: &AccessRecord, format: LogFormat) {
    let line = record.render(format);
    let request_id = record.request_id.as_deref().unwrap_or("-");
    if record.status >= 400 {
        tracing::warn!(request_id = %request_id, status = record.status, "{line}");
    } else {
        tracing::info!(request_id = %request_id, status = record.status, "{line}");
    }
}
