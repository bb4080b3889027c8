use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{Middleware, Next};
use crate::context::RequestContext;
use crate::error::HttpError;

/// Per route-key counters.
#[derive(Debug, Default)]
pub struct RouteStats {
    pub requests: AtomicUsize,
    pub errors: AtomicUsize,
    pub total_latency_ns: AtomicU64,
}

/// Request counters and latency, globally and per route key.
///
/// All counters are relaxed atomics; readings are eventually consistent.
/// Per-route entries are created on first use and keyed by the route's
/// precomputed key, so the hot path never formats strings.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    error_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    stack_size: AtomicUsize,
    routes: DashMap<Arc<str>, RouteStats>,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Requests that ended in an error or a 4xx/5xx status.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Mean latency over every request seen, zero before the first one.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Stack size of the coroutine that served the latest request.
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }

    /// Requests served for a route key.
    #[must_use]
    pub fn route_count(&self, route_key: &str) -> usize {
        self.routes
            .get(route_key)
            .map_or(0, |stats| stats.requests.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn route_errors(&self, route_key: &str) -> usize {
        self.routes
            .get(route_key)
            .map_or(0, |stats| stats.errors.load(Ordering::Relaxed))
    }

    /// `(route_key, requests, errors, average latency)` for every route seen.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, usize, usize, Duration)> {
        let mut rows: Vec<_> = self
            .routes
            .iter()
            .map(|entry| {
                let stats = entry.value();
                let requests = stats.requests.load(Ordering::Relaxed);
                let avg = if requests == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_nanos(stats.total_latency_ns.load(Ordering::Relaxed) / requests as u64)
                };
                (
                    entry.key().to_string(),
                    requests,
                    stats.errors.load(Ordering::Relaxed),
                    avg,
                )
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    fn record(&self, route_key: Option<&str>, failed: bool, latency: Duration) {
        let nanos = latency.as_nanos() as u64;
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns.fetch_add(nanos, Ordering::Relaxed);
        if failed {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }

        if may::coroutine::is_coroutine() {
            let size = may::coroutine::current().stack_size();
            self.stack_size.store(size, Ordering::Relaxed);
        } else {
            self.stack_size
                .store(may::config().get_stack_size(), Ordering::Relaxed);
        }

        let Some(key) = route_key else {
            return;
        };
        let bump = |stats: &RouteStats| {
            stats.requests.fetch_add(1, Ordering::Relaxed);
            stats.total_latency_ns.fetch_add(nanos, Ordering::Relaxed);
            if failed {
                stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        };
        if let Some(stats) = self.routes.get(key) {
            bump(&stats);
            return;
        }
        let stats = self.routes.entry(Arc::from(key)).or_default();
        bump(&stats);
    }
}

impl Middleware for MetricsMiddleware {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HttpError> {
        let start = Instant::now();
        let result = next.run(ctx);
        let failed = result.is_err()
            || ctx.response.status().is_client_error()
            || ctx.response.status().is_server_error();
        self.record(ctx.route_key(), failed, start.elapsed());
        result
    }
}
