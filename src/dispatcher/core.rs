//! Dispatcher core module - hot path for request dispatch.
//!
//! A [`Pipeline`] is built once by [`PipelineBuilder::freeze`] and then only
//! read. Per request it runs:
//!
//! ```text
//! before hooks ─▶ resolve route ─▶ global mw ─▶ route mw ─▶ handler
//!      │               │                  (onion, unwinds outward)
//!      │ body / ended  │ no match                    │
//!      ▼               ▼                             ▼
//!  after hooks ◀── error handler ◀──── any error ────┘
//!      │
//!      ▼
//!   finalize
//! ```
//!
//! Finalize always produces a response; it falls back to a generic 500 when
//! the body cannot be serialized.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::context::{ContextStorage, HeaderVec, Request, RequestContext, RequestScope};
use crate::error::HttpError;
use crate::ids::RequestId;
use crate::middleware::{run_handler, Middleware, Next};
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;

/// Before/after hook. An `Err` is routed to the error handler.
pub type Hook = Arc<dyn Fn(&mut RequestContext) -> Result<(), HttpError> + Send + Sync>;

/// Renders a request-time error into the response.
///
/// Called at most once per request. Returning `Err` leaves the request with a
/// generic 500.
pub type ErrorHandler =
    Arc<dyn Fn(&HttpError, &mut RequestContext) -> Result<(), HttpError> + Send + Sync>;

/// Status, headers and body bytes ready to be written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalResponse {
    pub status: StatusCode,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
    /// `Content-Type` chosen from the body kind, unless a header set one.
    pub content_type: Option<&'static str>,
}

impl FinalResponse {
    /// The generic 500 used when nothing better can be produced.
    #[must_use]
    pub fn internal_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderVec::new(),
            body: br#"{"error":"Internal Server Error"}"#.to_vec(),
            content_type: Some("application/json"),
        }
    }

    /// Header value, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as JSON, when it is JSON.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Renders the error's own status and JSON body. Used unless one is
/// configured. A `content-type` set before the failure no longer describes
/// the body and is dropped.
pub fn default_error_handler(err: &HttpError, ctx: &mut RequestContext) -> Result<(), HttpError> {
    ctx.response.remove_header("content-type");
    ctx.response.set_status(err.status());
    ctx.response.json(err.body().clone());
    Ok(())
}

enum Hooks {
    Empty,
    List(Vec<Hook>),
}

impl Hooks {
    fn from_vec(hooks: Vec<Hook>) -> Self {
        if hooks.is_empty() {
            Hooks::Empty
        } else {
            Hooks::List(hooks)
        }
    }

    fn len(&self) -> usize {
        match self {
            Hooks::Empty => 0,
            Hooks::List(hooks) => hooks.len(),
        }
    }
}

/// Collects hooks, middleware and the error handler before freezing.
pub struct PipelineBuilder {
    router: Router,
    before: Vec<Hook>,
    after: Vec<Hook>,
    middleware: Vec<Arc<dyn Middleware>>,
    error_handler: Option<ErrorHandler>,
    config: RuntimeConfig,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router,
            before: Vec::new(),
            after: Vec::new(),
            middleware: Vec::new(),
            error_handler: None,
            config: RuntimeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable ambient context storage regardless of the config.
    #[must_use]
    pub fn with_context_storage(mut self) -> Self {
        self.config.context_storage = true;
        self
    }

    /// Routes can still be added until the pipeline is frozen.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Runs before route resolution. Setting a body or ending the response
    /// skips the remaining before hooks, the route and its middleware.
    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<(), HttpError> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    /// Runs after the handler (or the error handler), in registration order.
    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<(), HttpError> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }

    /// Global middleware, run for every matched route ahead of the route's
    /// own middleware.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HttpError, &mut RequestContext) -> Result<(), HttpError> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Freeze into an immutable, shareable pipeline.
    #[must_use]
    pub fn freeze(self) -> Pipeline {
        let mut router = self.router;
        router.set_slow_match_threshold(self.config.slow_match_threshold());

        let storage = self.config.context_storage.then(ContextStorage::new);
        let error_handler: ErrorHandler = match self.error_handler {
            Some(handler) => handler,
            None => Arc::new(default_error_handler),
        };
        let pipeline = Pipeline {
            router,
            before: Hooks::from_vec(self.before),
            after: Hooks::from_vec(self.after),
            middleware: self.middleware,
            error_handler,
            storage,
            config: self.config,
        };

        info!(
            routes = pipeline.router.len(),
            before_hooks = pipeline.before.len(),
            after_hooks = pipeline.after.len(),
            global_middleware = pipeline.middleware.len(),
            context_storage = pipeline.storage.is_some(),
            uses_domains = pipeline.router.uses_domains(),
            "Pipeline frozen"
        );
        pipeline
    }
}

/// Frozen request pipeline. Cheap to share behind an `Arc`.
pub struct Pipeline {
    router: Router,
    before: Hooks,
    after: Hooks,
    middleware: Vec<Arc<dyn Middleware>>,
    error_handler: ErrorHandler,
    storage: Option<ContextStorage>,
    config: RuntimeConfig,
}

impl Pipeline {
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Present only when context storage was enabled at freeze time.
    #[must_use]
    pub fn context_storage(&self) -> Option<&ContextStorage> {
        self.storage.as_ref()
    }

    /// Context for `request`, with the request id taken from the configured
    /// header when it holds a valid id.
    #[must_use]
    pub fn context_for(&self, request: Request) -> RequestContext {
        let request_id = RequestId::from_header(request.header(&self.config.request_id_header));
        RequestContext::with_request_id(request, request_id)
    }

    /// Convenience for [`Pipeline::context_for`] followed by [`Pipeline::handle`].
    pub fn dispatch(&self, request: Request) -> FinalResponse {
        let mut ctx = self.context_for(request);
        self.handle(&mut ctx)
    }

    /// Run one request through every stage and finalize the response.
    pub fn handle(&self, ctx: &mut RequestContext) -> FinalResponse {
        let scope = self.storage.as_ref().map(|storage| {
            let scope = Arc::new(RequestScope::new(
                ctx.request_id,
                ctx.request.method().clone(),
                ctx.request.path(),
            ));
            (storage.enter(Arc::clone(&scope)), scope)
        });

        let mut error_handled = false;
        let outcome = guarded(|| self.run_stages(ctx, scope.as_ref().map(|(_, s)| s)));
        let mut healthy = match outcome {
            Ok(()) => true,
            Err(err) => {
                error_handled = true;
                self.handle_error(&err, ctx)
            }
        };

        if healthy {
            if let Err(err) = guarded(|| self.run_after(ctx)) {
                if error_handled {
                    error!(
                        request_id = %ctx.request_id,
                        error = %err,
                        "After hook failed after the error handler already ran"
                    );
                    ctx.response.internal_error();
                } else {
                    healthy = self.handle_error(&err, ctx);
                }
            }
        }
        if !healthy {
            ctx.response.internal_error();
        }

        let response = self.finalize(ctx);
        drop(scope);
        response
    }

    fn run_stages(
        &self,
        ctx: &mut RequestContext,
        scope: Option<&Arc<RequestScope>>,
    ) -> Result<(), HttpError> {
        if let Hooks::List(hooks) = &self.before {
            for (idx, hook) in hooks.iter().enumerate() {
                hook(ctx)?;
                if ctx.response.has_body() || !ctx.response.is_pending() {
                    debug!(
                        request_id = %ctx.request_id,
                        hook_idx = idx,
                        "Before hook short-circuited the request"
                    );
                    return Ok(());
                }
            }
        }

        let hostname = if self.router.uses_domains() {
            ctx.request.hostname()
        } else {
            None
        };
        let found = self
            .router
            .route(ctx.request.method(), ctx.request.path(), hostname)
            .ok_or_else(|| {
                HttpError::route_not_found(ctx.request.method().clone(), ctx.request.path())
            })?;

        let route = Arc::clone(&found.route);
        ctx.bind(found);
        if let Some(scope) = scope {
            if let Some(snapshot) = ctx.route_snapshot() {
                scope.bind_route(snapshot);
            }
        }

        if self.middleware.is_empty() && route.middleware.is_empty() {
            run_handler(&route.handler, ctx)
        } else {
            Next::new(&self.middleware, &route.middleware, &route.handler).run(ctx)
        }
    }

    fn run_after(&self, ctx: &mut RequestContext) -> Result<(), HttpError> {
        if let Hooks::List(hooks) = &self.after {
            for hook in hooks {
                hook(ctx)?;
            }
        }
        Ok(())
    }

    /// Invoke the error handler. Returns `false` when it failed too.
    fn handle_error(&self, err: &HttpError, ctx: &mut RequestContext) -> bool {
        if err.is_route_not_found() {
            debug!(request_id = %ctx.request_id, error = %err, "Routing error handled");
        } else if err.status().is_server_error() {
            error!(
                request_id = %ctx.request_id,
                status = err.status().as_u16(),
                error = %err,
                source = ?std::error::Error::source(err).map(ToString::to_string),
                "Request failed"
            );
        } else {
            warn!(
                request_id = %ctx.request_id,
                status = err.status().as_u16(),
                error = %err,
                "Request raised an HTTP exception"
            );
        }

        match guarded(|| (self.error_handler)(err, ctx)) {
            Ok(()) => true,
            Err(handler_err) => {
                error!(
                    request_id = %ctx.request_id,
                    original = %err,
                    error = %handler_err,
                    "Error handler failed"
                );
                false
            }
        }
    }

    fn finalize(&self, ctx: &mut RequestContext) -> FinalResponse {
        ctx.response.end();
        let status = ctx.response.status();
        let headers = ctx.response.headers().clone();

        let (body, content_type) = match ctx.response.take_body() {
            None => (Vec::new(), None),
            Some(body) => {
                let content_type = body.content_type();
                match body.into_bytes() {
                    Ok(bytes) => (bytes, Some(content_type)),
                    Err(err) => {
                        error!(
                            request_id = %ctx.request_id,
                            error = %err,
                            "Response body could not be serialized"
                        );
                        return FinalResponse::internal_error();
                    }
                }
            }
        };

        let has_explicit_type = headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));

        FinalResponse {
            status,
            headers,
            body,
            content_type: if has_explicit_type { None } else { content_type },
        }
    }
}

/// Run a stage, turning a panic into an internal error.
fn guarded<F>(stage: F) -> Result<(), HttpError>
where
    F: FnOnce() -> Result<(), HttpError>,
{
    match catch_unwind(AssertUnwindSafe(stage)) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(panic = %message, "Request stage panicked");
            Err(HttpError::internal(anyhow!("stage panicked: {message}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Body;
    use crate::handler::HandlerRef;
    use crate::router::Route;
    use http::Method;
    use serde_json::json;

    fn pipeline_with(builder: impl FnOnce(PipelineBuilder) -> PipelineBuilder) -> Pipeline {
        let mut router = Router::new();
        router
            .add(Route::get("/ok", HandlerRef::function(|_ctx| Ok(Some(Body::from(json!({"ok": true})))))))
            .unwrap();
        builder(PipelineBuilder::new(router)).freeze()
    }

    #[test]
    fn test_fast_path_without_hooks() {
        let pipeline = pipeline_with(|b| b);
        assert!(matches!(pipeline.before, Hooks::Empty));
        let res = pipeline.dispatch(Request::new(Method::GET, "/ok"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type, Some("application/json"));
        assert_eq!(res.json(), Some(json!({"ok": true})));
    }

    #[test]
    fn test_panicking_handler_becomes_500() {
        let mut router = Router::new();
        router
            .add(Route::get("/boom", HandlerRef::function(|_ctx| panic!("kaboom"))))
            .unwrap();
        let pipeline = PipelineBuilder::new(router).freeze();
        let res = pipeline.dispatch(Request::new(Method::GET, "/boom"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.json(), Some(json!({"error": "Internal Server Error"})));
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let pipeline = pipeline_with(|b| {
            b.after(|ctx| {
                ctx.response.set_header("content-type", "application/vnd.api+json");
                Ok(())
            })
        });
        let res = pipeline.dispatch(Request::new(Method::GET, "/ok"));
        assert_eq!(res.content_type, None);
        assert_eq!(res.header("Content-Type"), Some("application/vnd.api+json"));
    }
}
