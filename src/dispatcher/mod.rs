//! # Dispatcher Module
//!
//! The dispatcher runs a request through the frozen pipeline: before hooks,
//! route resolution, the middleware onion, the handler, a single error
//! handler, after hooks and finalize.
//!
//! ## Building a Pipeline
//!
//! ```rust,ignore
//! use switchyard::dispatcher::PipelineBuilder;
//! use switchyard::middleware::TracingMiddleware;
//!
//! let pipeline = PipelineBuilder::new(router)
//!     .before(|ctx| {
//!         if ctx.request.header("authorization").is_none() {
//!             ctx.response.set_status(StatusCode::UNAUTHORIZED);
//!             ctx.response.json(json!({ "error": "unauthorized" }));
//!         }
//!         Ok(())
//!     })
//!     .middleware(Arc::new(TracingMiddleware))
//!     .error_handler(|err, ctx| {
//!         ctx.response.set_status(err.status());
//!         ctx.response.json(err.body().clone());
//!         Ok(())
//!     })
//!     .freeze();
//!
//! let response = pipeline.dispatch(Request::new(Method::GET, "/users/42"));
//! ```
//!
//! ## Short-Circuiting
//!
//! - A before hook that writes a body or ends the response skips the
//!   remaining before hooks, route resolution and every middleware. After
//!   hooks still run.
//! - A middleware that returns without calling `next.run(ctx)` stops the
//!   chain; the handler never runs and outer layers still unwind.
//!
//! ## Error Handling
//!
//! - No matching route raises a not-found `HttpError`; global middleware do
//!   not run for it.
//! - Any `Err` from a hook, middleware or handler, and any panic, reaches the
//!   error handler exactly once.
//! - A failing error handler leaves a generic 500 and skips after hooks.
//! - Finalize never fails: unserializable bodies become a generic 500.
//!
//! ## Performance Considerations
//!
//! - Empty hook lists are detected at freeze time and skipped entirely
//! - With no global and no route middleware the handler is called directly
//! - The middleware cursor walks two borrowed slices; nothing is allocated
//!   per request to build the chain

mod core;

pub use self::core::{
    default_error_handler, ErrorHandler, FinalResponse, Hook, Pipeline, PipelineBuilder,
};
