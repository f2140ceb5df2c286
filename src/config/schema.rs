//! Configuration schema definitions.
//!
//! Every section derives Serde traits and defaults each field, so an empty
//! file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::middleware::logger::LogFormat;

/// Root configuration for a rapidfy server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, concurrency).
    pub listener: ListenerConfig,

    /// Request deadlines.
    pub timeouts: TimeoutConfig,

    /// Request body parsing.
    pub body: BodyConfig,

    /// Request logging and log output.
    pub logging: LoggingConfig,

    /// Metrics exporter settings.
    pub observability: ObservabilityConfig,

    /// Cross-origin resource sharing.
    pub cors: CorsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum requests processed at once (backpressure).
    pub max_concurrent_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_concurrent_requests: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in seconds. 0 disables it.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Body parser configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    pub enabled: bool,

    /// Largest accepted body in bytes.
    pub limit_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit_bytes: 1024 * 1024,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub level: String,

    /// Access log line format.
    pub format: LogFormat,

    /// Emit JSON log lines instead of plain text.
    pub json: bool,

    /// Disable the access log entirely.
    pub production: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Dev,
            json: false,
            production: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,

    /// Allowed origins; `"*"` allows any.
    pub origins: Vec<String>,

    pub methods: Vec<String>,

    /// Allowed request headers.
    pub headers: Vec<String>,

    pub exposed_headers: Vec<String>,

    pub credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age: u64,

    /// Status sent for a successful preflight.
    pub options_success_status: u16,

    /// Pass preflight requests on to later middleware and routes.
    pub preflight_continue: bool,

    /// Message in the 403 body for rejected origins.
    pub error_message: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            origins: vec!["*".to_string()],
            methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            exposed_headers: Vec::new(),
            credentials: false,
            max_age: 86_400,
            options_success_status: 204,
            preflight_continue: false,
            error_message: "CORS policy: No access-control-allow-origin header is present on the requested resource.".to_string(),
        }
    }
}
