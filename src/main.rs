//! rapidfy demo server.
//!
//! ```text
//!   Client ──▶ axum (request id, trace) ──▶ Dispatcher
//!                                            │
//!                 ┌──────────────────────────┘
//!                 ▼
//!   body parser ─▶ request logger ─▶ cors ─▶ timeout ─▶ route stage
//!                                                        │
//!                                   handler / not found ◀┘
//! ```
//!
//! Configuration comes from an optional TOML file; `--bind` overrides the
//! listener address.

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;

use rapidfy::config::{load_config, AppConfig};
use rapidfy::middleware::{BodyParser, Cors, RequestLogger, Timeout};
use rapidfy::observability::{logging, metrics};
use rapidfy::{App, Router};

#[derive(Debug, Parser)]
#[command(name = "rapidfy")]
#[command(about = "Demo server for the rapidfy framework", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener address, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<String>,
}

fn demo_app(config: &AppConfig) -> rapidfy::Result<App> {
    let mut app = App::new();
    app.concurrency_limit(config.listener.max_concurrent_requests);

    if config.body.enabled {
        app.use_middleware(BodyParser::new(config.body.limit_bytes));
    }
    app.use_middleware(
        RequestLogger::new(config.logging.format).production(config.logging.production),
    );
    if config.cors.enabled {
        app.use_middleware(Cors::from_config(&config.cors)?);
    }
    if config.timeouts.request_secs > 0 {
        app.use_middleware(Timeout::from_secs(config.timeouts.request_secs));
    }

    let mut router = Router::new();
    router
        .get("/get-param/:id", |req, res| {
            Box::pin(async move { res.json(req.params()) })
        })
        .get("/get-query", |req, res| {
            Box::pin(async move { res.json(req.query()) })
        });

    app.mount("/api/v1", router.clone())
        .mount("/api", router)
        .get("/get-body", |req, res| {
            Box::pin(async move {
                let body = req.body().cloned().unwrap_or_else(|| json!({}));
                res.json(&body)
            })
        })
        .post("/get-body", |req, res| {
            Box::pin(async move {
                let body = req.body().cloned().unwrap_or_else(|| json!({}));
                res.json(&body)
            })
        })
        .get("/redirect", |_req, res| {
            Box::pin(async move { res.redirect("https://example.com") })
        })
        .get("/health", |_req, res| {
            Box::pin(async move { res.json(&json!({ "status": "ok" })) })
        });

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.logging);
    tracing::info!("rapidfy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_concurrent_requests = config.listener.max_concurrent_requests,
        request_timeout_secs = config.timeouts.request_secs,
        cors_enabled = config.cors.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = demo_app(&config)?;
    app.listen(&config.listener.bind_address, |addr| {
        tracing::info!(address = %addr, "Listening for connections");
    })
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
