//! Route handler capability.

use futures_util::future::BoxFuture;

use crate::error::Result;
use crate::http::{Request, Response};

/// Something that can serve a matched request.
///
/// Closures of the shape
/// `|req: &mut Request, res: &mut Response| Box::pin(async move { ... })`
/// implement this trait; types with state can implement it directly.
pub trait Handler: Send + Sync {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Result>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result> + Send + Sync,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Result> {
        self(req, res)
    }
}
