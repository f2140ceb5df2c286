//! End-to-end dispatch through `App::build()`, without a socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::future::{self, BoxFuture};
use rapidfy::middleware::{BodyParser, RequestLogger, Timeout};
use rapidfy::{App, Error, Request, Response, Result, Router};
use serde_json::{json, Value};

mod common;

use common::{read, request};

fn ping<'a>(_req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Result> {
    Box::pin(async move { res.send("pong") })
}

fn json_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn empty_table_answers_not_found() {
    let dispatcher = App::new().build();
    let (status, body) = read(dispatcher.dispatch(request("GET", "/missing")).await).await;

    assert_eq!(status, 404);
    assert_eq!(
        json_body(&body),
        json!({ "message": "Not Found", "method": "GET", "path": "/missing" })
    );
}

#[tokio::test]
async fn handler_errors_become_500_sync_or_async() {
    fn fails_immediately<'a>(_req: &'a mut Request, _res: &'a mut Response) -> BoxFuture<'a, Result> {
        Box::pin(future::ready(Err(Error::other("boom right away"))))
    }

    fn fails_after_await<'a>(_req: &'a mut Request, _res: &'a mut Response) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            Err(Error::other("boom later"))
        })
    }

    let mut app = App::new();
    app.get("/boom", fails_immediately)
        .get("/boom-async", fails_after_await);
    let dispatcher = app.build();

    let (status, body) = read(dispatcher.dispatch(request("GET", "/boom")).await).await;
    assert_eq!(status, 500);
    assert_eq!(json_body(&body), json!({ "message": "boom right away" }));

    let (status, body) = read(dispatcher.dispatch(request("GET", "/boom-async")).await).await;
    assert_eq!(status, 500);
    assert_eq!(json_body(&body), json!({ "message": "boom later" }));
}

#[tokio::test]
async fn handler_panics_become_500() {
    fn explode() -> Result {
        panic!("handler exploded")
    }

    fn panics<'a>(_req: &'a mut Request, _res: &'a mut Response) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            explode()
        })
    }

    let mut app = App::new();
    app.get("/panic", panics);
    let (status, body) = read(app.build().dispatch(request("GET", "/panic")).await).await;

    assert_eq!(status, 500);
    assert_eq!(json_body(&body)["message"], "handler exploded");
}

#[tokio::test]
async fn handler_sees_params_and_empty_query() {
    let seen: Arc<Mutex<Option<(HashMap<String, String>, HashMap<String, String>)>>> =
        Arc::default();
    let captured = Arc::clone(&seen);

    let mut app = App::new();
    app.get("/users/:id", move |req, res| {
        let captured = Arc::clone(&captured);
        Box::pin(async move {
            *captured.lock().unwrap() = Some((req.params().clone(), req.query().clone()));
            res.end()
        })
    });
    app.build().dispatch(request("GET", "/users/42")).await;

    let (params, query) = seen.lock().unwrap().take().unwrap();
    assert_eq!(params, HashMap::from([("id".to_string(), "42".to_string())]));
    assert!(query.is_empty());
}

#[tokio::test]
async fn first_registered_route_wins() {
    let mut app = App::new();
    app.get("/items/:id", |_req, res| Box::pin(async move { res.send("by id") }))
        .get("/items/new", |_req, res| Box::pin(async move { res.send("new") }));

    let (_, body) = read(app.build().dispatch(request("GET", "/items/new")).await).await;
    assert_eq!(body, "by id");
}

#[tokio::test]
async fn mounted_router_serves_under_each_prefix() {
    let mut router = Router::new();
    router.get("/ping", ping);

    let mut app = App::new();
    app.mount("/api", router.clone()).mount("/", router);
    let dispatcher = app.build();

    let templates: Vec<&str> = dispatcher
        .routes()
        .routes()
        .iter()
        .map(|r| r.template())
        .collect();
    assert_eq!(templates, ["/api/ping", "/ping"]);

    for path in ["/api/ping", "/ping"] {
        let (status, body) = read(dispatcher.dispatch(request("GET", path)).await).await;
        assert_eq!((status, body.as_str()), (200, "pong"), "path {path}");
    }
    let (status, _) = read(dispatcher.dispatch(request("GET", "/api//ping")).await).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn halting_middleware_never_reaches_handler() {
    let reached = Arc::new(AtomicUsize::new(0));
    let handler_hits = Arc::clone(&reached);
    let later_middleware = Arc::new(AtomicUsize::new(0));
    let later_hits = Arc::clone(&later_middleware);

    let mut app = App::new();
    app.use_fn(|_req, res, _next| {
        Box::pin(async move { res.status(StatusCode::SERVICE_UNAVAILABLE).send("maintenance") })
    })
    .use_fn(move |req, res, next| {
        later_hits.fetch_add(1, Ordering::SeqCst);
        next.run(req, res)
    })
    .get("/ping", move |_req, res| {
        handler_hits.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { res.send("pong") })
    })
    .not_found(|_req, _res| panic!("not-found policy must not run"))
    .on_error(|_err, _req, _res| panic!("error policy must not run"));

    let (status, body) = read(app.build().dispatch(request("GET", "/ping")).await).await;
    assert_eq!((status, body.as_str()), (503, "maintenance"));
    assert_eq!(reached.load(Ordering::SeqCst), 0);
    assert_eq!(later_middleware.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn each_middleware_runs_once_and_completion_fires_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let completions = Arc::new(AtomicUsize::new(0));
    let (r, c) = (Arc::clone(&runs), Arc::clone(&completions));

    let mut app = App::new();
    app.use_fn(move |req, res, next| {
        r.fetch_add(1, Ordering::SeqCst);
        let c = Arc::clone(&c);
        res.on_finish(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        next.run(req, res)
    })
    .get("/ok", ping)
    .get("/err", |_req, _res| Box::pin(async { Err(Error::other("nope")) }));
    let dispatcher = app.build();

    for (path, expected) in [("/ok", 200), ("/err", 500), ("/missing", 404)] {
        runs.store(0, Ordering::SeqCst);
        completions.store(0, Ordering::SeqCst);
        let (status, _) = read(dispatcher.dispatch(request("GET", path)).await).await;
        assert_eq!(status, expected, "path {path}");
        assert_eq!(runs.load(Ordering::SeqCst), 1, "path {path}");
        assert_eq!(completions.load(Ordering::SeqCst), 1, "path {path}");
    }
}

#[tokio::test]
async fn middleware_errors_skip_routing() {
    let mut app = App::new();
    app.use_fn(|_req, _res, _next| {
        Box::pin(async { Err(Error::http(StatusCode::UNAUTHORIZED, "missing token")) })
    })
    .get("/secret", |_req, _res| panic!("handler must not run"));

    let (status, body) = read(app.build().dispatch(request("GET", "/secret")).await).await;
    assert_eq!(status, 401);
    assert_eq!(json_body(&body), json!({ "message": "missing token" }));
}

#[tokio::test]
async fn prefixed_middleware_is_scoped() {
    let mut app = App::new();
    app.use_at(
        "/admin",
        rapidfy::from_fn(|_req, res, _next| {
            Box::pin(async move { res.status(StatusCode::FORBIDDEN).send("admins only") })
        }),
    )
    .get("/admin/panel", ping)
    .get("/public", ping);
    let dispatcher = app.build();

    let (status, _) = read(dispatcher.dispatch(request("GET", "/admin/panel")).await).await;
    assert_eq!(status, 403);
    let (status, _) = read(dispatcher.dispatch(request("GET", "/public")).await).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn custom_policies_replace_defaults() {
    let mut app = App::new();
    app.get("/fail", |_req, _res| Box::pin(async { Err(Error::other("hidden detail")) }))
        .not_found(|req, res| {
            res.status(StatusCode::NOT_FOUND)
                .send(format!("no page at {}", req.path()))
        })
        .on_error(|_err, _req, res| {
            res.status(StatusCode::SERVICE_UNAVAILABLE)
                .json(&json!({ "message": "try again later" }))
        });
    let dispatcher = app.build();

    let (status, body) = read(dispatcher.dispatch(request("GET", "/nope")).await).await;
    assert_eq!((status, body.as_str()), (404, "no page at /nope"));

    let (status, body) = read(dispatcher.dispatch(request("GET", "/fail")).await).await;
    assert_eq!(status, 503);
    assert_eq!(json_body(&body), json!({ "message": "try again later" }));
}

#[tokio::test]
async fn error_after_response_was_sent_keeps_response() {
    let mut app = App::new();
    app.get("/partial", |_req, res| {
        Box::pin(async move {
            res.send("done")
                .and_then(|()| Err(Error::other("late failure")))
        })
    });

    let (status, body) = read(app.build().dispatch(request("GET", "/partial")).await).await;
    assert_eq!((status, body.as_str()), (200, "done"));
}

#[tokio::test(start_paused = true)]
async fn timeout_middleware_answers_504() {
    let mut app = App::new();
    app.use_middleware(Timeout::new(Duration::from_millis(100)))
        .get("/slow", |_req, res| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                res.send("too late")
            })
        });

    let (status, body) = read(app.build().dispatch(request("GET", "/slow")).await).await;
    assert_eq!(status, 504);
    assert!(json_body(&body)["message"]
        .as_str()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn body_parser_and_logger_feed_handlers() {
    let mut app = App::new();
    app.use_middleware(BodyParser::new(64))
        .use_middleware(RequestLogger::default())
        .post("/echo", |req, res| {
            Box::pin(async move {
                let body = req.body().cloned().unwrap_or(Value::Null);
                res.status(StatusCode::CREATED).json(&body)
            })
        });
    let dispatcher = app.build();

    let post = axum::http::Request::builder()
        .method("POST")
        .uri("/echo")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"name":"neo"}"#))
        .unwrap();
    let (status, body) = read(dispatcher.dispatch(post).await).await;
    assert_eq!(status, 201);
    assert_eq!(json_body(&body), json!({ "name": "neo" }));

    let oversized = axum::http::Request::builder()
        .method("POST")
        .uri("/echo")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(format!(r#"{{"pad":"{}"}}"#, "x".repeat(128))))
        .unwrap();
    let (status, _) = read(dispatcher.dispatch(oversized).await).await;
    assert_eq!(status, 413);
}

#[tokio::test]
async fn middleware_panicking_before_its_future_becomes_500() {
    fn require_tenant(tenant: Option<&str>) -> &str {
        match tenant {
            Some(tenant) => tenant,
            None => panic!("tenant header missing"),
        }
    }

    let mut app = App::new();
    app.use_fn(|req, res, next| {
        require_tenant(req.header("x-tenant"));
        next.run(req, res)
    })
    .get("/ping", ping);

    let (status, body) = read(app.build().dispatch(request("GET", "/ping")).await).await;
    assert_eq!(status, 500);
    assert_eq!(json_body(&body), json!({ "message": "tenant header missing" }));
}

#[tokio::test]
async fn failing_error_policy_still_answers_with_error_body() {
    let mut app = App::new();
    app.get("/boom", |_req, _res| Box::pin(async { Err(Error::other("boom")) }))
        .on_error(|_err, _req, _res| Err(Error::other("policy broke")));

    let (status, body) = read(app.build().dispatch(request("GET", "/boom")).await).await;
    assert_eq!(status, 500);
    assert_eq!(json_body(&body), json!({ "message": "boom" }));
}
