use tracing::{field, info_span, warn};

use super::{Middleware, Next};
use crate::context::RequestContext;
use crate::error::HttpError;

/// Wraps the rest of the chain in a `request` span.
///
/// The span carries the request id, method, path and route key; status and
/// latency are recorded once the inner layers return.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HttpError> {
        let span = info_span!(
            "request",
            request_id = %ctx.request_id,
            method = %ctx.request.method(),
            path = %ctx.request.path(),
            route_key = ctx.route_key().unwrap_or("-"),
            status = field::Empty,
            latency_us = field::Empty,
        );
        let _entered = span.enter();

        let result = next.run(ctx);

        let status = match &result {
            Ok(()) => ctx.response.status(),
            Err(err) => err.status(),
        };
        span.record("status", status.as_u16());
        span.record("latency_us", ctx.elapsed().as_micros() as u64);
        if let Err(err) = &result {
            warn!(error = %err, "Request failed inside middleware chain");
        }
        result
    }
}
