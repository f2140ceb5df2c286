//! Minimal HTTP application framework.
//!
//! Segment-based routing with `:param` captures, mountable sub-routers, and an
//! ordered async middleware chain in front of the route stage, served over
//! Axum.
//!
//! ```ignore
//! let mut app = rapidfy::App::new();
//! app.use_middleware(rapidfy::middleware::BodyParser::default());
//! app.get("/users/:id", |req, res| Box::pin(async move {
//!     let id = req.param("id").unwrap_or_default().to_string();
//!     res.json(&serde_json::json!({ "id": id }))
//! }));
//! app.listen("0.0.0.0:3000", |addr| println!("listening on {addr}")).await?;
//! ```

pub mod app;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use app::{App, UseKind};
pub use config::AppConfig;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use middleware::{from_fn, Middleware, Next};
pub use routing::{Handler, Router};
