use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::json;
use switchyard::handler::HandlerRef;
use switchyard::middleware::{from_fn, MetricsMiddleware, Next, TracingMiddleware};
use switchyard::{HttpError, Middleware, PipelineBuilder, Request, RequestContext, Route, Router};

mod common;
use common::handlers::named;

fn metrics_pipeline(metrics: &Arc<MetricsMiddleware>) -> switchyard::Pipeline {
    let mut router = Router::new();
    router.add(Route::get("/users/:id", named("users.show"))).unwrap();
    router
        .add(Route::post(
            "/users",
            HandlerRef::function(|_ctx| {
                Err(HttpError::with_message(StatusCode::BAD_REQUEST, "missing name"))
            }),
        ))
        .unwrap();

    let layer: Arc<dyn Middleware> = Arc::clone(metrics) as Arc<dyn Middleware>;
    PipelineBuilder::new(router)
        .middleware(Arc::new(TracingMiddleware))
        .middleware(layer)
        .freeze()
}

#[test]
fn test_metrics_count_per_route_key() {
    let metrics = Arc::new(MetricsMiddleware::new());
    let pipeline = metrics_pipeline(&metrics);

    for id in 1..=3 {
        let res = pipeline.dispatch(Request::new(Method::GET, &format!("/users/{id}")));
        assert_eq!(res.status, StatusCode::OK);
    }
    let res = pipeline.dispatch(Request::new(Method::POST, "/users"));
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    assert_eq!(metrics.request_count(), 4);
    assert_eq!(metrics.error_count(), 1);
    assert_eq!(metrics.route_count("GET-/users/:id"), 3);
    assert_eq!(metrics.route_errors("GET-/users/:id"), 0);
    assert_eq!(metrics.route_count("POST-/users"), 1);
    assert_eq!(metrics.route_errors("POST-/users"), 1);
    assert!(metrics.stack_size() > 0);
}

#[test]
fn test_unmatched_requests_never_reach_middleware() {
    let metrics = Arc::new(MetricsMiddleware::new());
    let pipeline = metrics_pipeline(&metrics);

    let res = pipeline.dispatch(Request::new(Method::GET, "/nope"));
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(metrics.request_count(), 0);
}

#[test]
fn test_tracing_middleware_is_transparent() {
    let mut router = Router::new();
    router.add(Route::get("/users/:id", named("users.show"))).unwrap();
    let pipeline = PipelineBuilder::new(router)
        .middleware(Arc::new(TracingMiddleware))
        .freeze();

    let res = pipeline.dispatch(Request::new(Method::GET, "/users/5"));
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.json(),
        Some(json!({ "handler": "users.show", "params": { "id": "5" } }))
    );
}

/// Adds a header on the way out, after the handler ran.
struct StampMiddleware;

impl Middleware for StampMiddleware {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HttpError> {
        let result = next.run(ctx);
        let status = ctx.response.status().as_u16().to_string();
        ctx.response.set_header("x-stamped-status", &status);
        result
    }
}

#[test]
fn test_trait_middleware_sees_response_on_the_way_out() {
    let mut router = Router::new();
    router
        .add(Route::get("/", named("root")).middleware(Arc::new(StampMiddleware)))
        .unwrap();
    let pipeline = PipelineBuilder::new(router).freeze();

    let res = pipeline.dispatch(Request::new(Method::GET, "/"));
    assert_eq!(res.header("x-stamped-status"), Some("200"));
}

#[test]
fn test_route_middleware_only_applies_to_its_route() {
    let guard = from_fn(|ctx, next| {
        if ctx.request.header("authorization").is_none() {
            return Err(HttpError::with_message(StatusCode::UNAUTHORIZED, "login required"));
        }
        next.run(ctx)
    });

    let mut router = Router::new();
    router.add(Route::get("/public", named("public"))).unwrap();
    router
        .add(Route::get("/private", named("private")).middleware(guard))
        .unwrap();
    let pipeline = PipelineBuilder::new(router).freeze();

    assert_eq!(
        pipeline.dispatch(Request::new(Method::GET, "/public")).status,
        StatusCode::OK
    );
    assert_eq!(
        pipeline.dispatch(Request::new(Method::GET, "/private")).status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        pipeline
            .dispatch(Request::new(Method::GET, "/private").with_header("Authorization", "Bearer x"))
            .status,
        StatusCode::OK
    );
}
