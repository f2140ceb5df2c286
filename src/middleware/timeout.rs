//! Per-request deadline.
//!
//! Races the rest of the chain against a timer. When the timer wins, the
//! in-flight continuation is dropped, so it can never write to the response,
//! and `Error::Timeout` flows to the error funnel (504).

use std::time::Duration;

use futures_util::future::BoxFuture;

use super::{Middleware, Next};
use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Timeout middleware.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Middleware for Timeout {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let path = req.path().to_string();
            match tokio::time::timeout(self.duration, next.run(req, res)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        path = %path,
                        timeout_ms = self.duration.as_millis() as u64,
                        "Request timed out"
                    );
                    Err(Error::Timeout(self.duration))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{ChainOutcome, MiddlewareChain};
    use crate::routing::Handler;
    use axum::body::Body;
    use axum::http::StatusCode;

    struct Sleepy(Duration);

    impl Handler for Sleepy {
        fn call<'a>(&'a self, _req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Result> {
            Box::pin(async move {
                tokio::time::sleep(self.0).await;
                res.send("late")
            })
        }
    }

    async fn run(timeout: Duration, work: Duration) -> (ChainOutcome, Response) {
        let mut chain = MiddlewareChain::new();
        chain.push(Timeout::new(timeout));
        let mut req = Request::from_http(
            axum::http::Request::builder()
                .uri("/slow")
                .body(Body::empty())
                .unwrap(),
        );
        let mut res = Response::new();
        let outcome = chain.execute(&mut req, &mut res, &Sleepy(work)).await;
        (outcome, res)
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handlers_time_out() {
        let (outcome, res) = run(Duration::from_millis(50), Duration::from_secs(5)).await;
        match outcome {
            ChainOutcome::Failed(err) => {
                assert!(matches!(err, Error::Timeout(_)));
                assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!res.is_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn fast_handlers_complete() {
        let (outcome, res) = run(Duration::from_secs(5), Duration::from_millis(10)).await;
        assert!(matches!(outcome, ChainOutcome::Completed));
        assert_eq!(res.body().as_ref(), b"late");
    }
}
