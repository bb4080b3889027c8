use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::HttpError;
use crate::handler::HandlerRef;

/// Onion-style middleware.
///
/// Code before `next.run(ctx)` sees the request on the way in, code after it
/// sees the response on the way out. Returning without calling `next` stops
/// the chain; the handler never runs.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HttpError>;
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext, Next<'_>) -> Result<(), HttpError> + Send + Sync,
{
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HttpError> {
        (self.0)(ctx, next)
    }
}

/// Wrap a closure as middleware.
///
/// ```rust,ignore
/// let timing = from_fn(|ctx, next| {
///     let result = next.run(ctx);
///     ctx.response.set_header("x-elapsed-us", &ctx.elapsed().as_micros().to_string());
///     result
/// });
/// ```
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&mut RequestContext, Next<'_>) -> Result<(), HttpError> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// Cursor over the remaining middleware of one request.
///
/// Global middleware run first, then the route's own, then the handler.
/// `run` consumes the cursor, so each layer can call the next one at most
/// once.
pub struct Next<'a> {
    global: &'a [Arc<dyn Middleware>],
    route: &'a [Arc<dyn Middleware>],
    handler: &'a HandlerRef,
    position: usize,
}

impl<'a> Next<'a> {
    #[must_use]
    pub fn new(
        global: &'a [Arc<dyn Middleware>],
        route: &'a [Arc<dyn Middleware>],
        handler: &'a HandlerRef,
    ) -> Self {
        Self {
            global,
            route,
            handler,
            position: 0,
        }
    }

    /// Index of the middleware this cursor will run next.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Middleware still ahead of the handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        (self.global.len() + self.route.len()).saturating_sub(self.position)
    }

    /// Run the next middleware, or the handler once the chain is exhausted.
    pub fn run(self, ctx: &mut RequestContext) -> Result<(), HttpError> {
        let current = match self.global.get(self.position) {
            Some(middleware) => Some(middleware),
            None => self.route.get(self.position - self.global.len()),
        };

        match current {
            Some(middleware) => {
                let next = Next {
                    position: self.position + 1,
                    ..self
                };
                middleware.handle(ctx, next)
            }
            None => run_handler(self.handler, ctx),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("remaining", &self.remaining())
            .field("handler", self.handler)
            .finish()
    }
}

/// Call the handler and use its return value as the body unless the handler
/// already wrote one.
pub fn run_handler(handler: &HandlerRef, ctx: &mut RequestContext) -> Result<(), HttpError> {
    if let Some(body) = handler.call(ctx)? {
        if !ctx.response.has_body() {
            ctx.response.send(body);
        }
    }
    Ok(())
}
