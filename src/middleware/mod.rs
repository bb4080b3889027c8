//! Middleware: onion layers wrapped around route handlers.
//!
//! Global middleware (registered on the pipeline) run before route
//! middleware (registered on the route), both in registration order.

mod core;
mod metrics;
mod tracing;

pub use self::core::{from_fn, run_handler, FnMiddleware, Middleware, Next};
pub use self::metrics::{MetricsMiddleware, RouteStats};
pub use self::tracing::TracingMiddleware;
