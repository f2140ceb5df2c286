//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap a `Dispatcher` in an Axum router fallback
//! - Wire up transport layers (tracing, request ID)
//! - Bound concurrent requests (backpressure)
//! - Serve a listener until shutdown
//!
//! # Design Decisions
//! - Every request goes to the fallback; routing is the dispatcher's job
//! - When the request limit is reached, new requests wait for a slot
//! - Request IDs are generated (UUID v4) when absent and echoed back

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::dispatcher::Dispatcher;
use crate::http::request::UuidRequestId;

/// Default bound on requests processed at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10_000;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Clone)]
struct ServerState {
    dispatcher: Arc<Dispatcher>,
    permits: Arc<Semaphore>,
}

/// HTTP server for a rapidfy application.
pub struct HttpServer {
    dispatcher: Arc<Dispatcher>,
    max_concurrent_requests: usize,
}

impl HttpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    /// Bound the number of requests dispatched at once.
    pub fn with_concurrency_limit(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    /// Build the Axum router with all transport layers.
    pub fn router(&self) -> Router {
        let state = ServerState {
            dispatcher: Arc::clone(&self.dispatcher),
            permits: Arc::new(Semaphore::new(self.max_concurrent_requests)),
        };

        Router::new()
            .fallback(dispatch_request)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Bind a TCP listener on `address`.
    pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
        TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.to_string(),
                source,
            })
    }

    /// Serve `listener` until the broadcast shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        self.run_with_shutdown(listener, async move {
            let _ = shutdown.recv().await;
        })
        .await
    }

    /// Serve `listener` until `signal` resolves, then drain in-flight requests.
    pub async fn run_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.routes().len(),
            middleware = self.dispatcher.chain().len(),
            max_concurrent_requests = self.max_concurrent_requests,
            "HTTP server starting"
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fallback handler: every request goes through the dispatcher.
async fn dispatch_request(State(state): State<ServerState>, request: Request<Body>) -> Response {
    let _permit = match state.permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };
    state.dispatcher.dispatch(request).await
}
