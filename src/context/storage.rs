//! Ambient, per-request context storage.
//!
//! When enabled, the pipeline binds a [`RequestScope`] for the duration of
//! each request. Code running inside that request (helpers, loggers,
//! repositories) can reach the scope through [`ContextStorage::current`]
//! without the context being threaded through every call.
//!
//! Scopes live in coroutine-local storage, so two requests served by
//! coroutines multiplexed onto the same worker thread never observe each
//! other's scope. Outside a coroutine the storage falls back to the current
//! thread.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use http::Method;
use tracing::debug;

use crate::ids::RequestId;
use crate::router::ParamVec;

may::coroutine_local!(static ACTIVE_SCOPES: RefCell<Vec<(u64, Arc<RequestScope>)>> = RefCell::new(Vec::new()));

static NEXT_STORAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Route facts recorded once the request has been resolved.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    pub route_key: Arc<str>,
    pub pattern: String,
    pub name: Option<String>,
    pub params: ParamVec,
    pub subdomains: ParamVec,
}

/// What ambient code can see about the request being served.
#[derive(Debug)]
pub struct RequestScope {
    request_id: RequestId,
    method: Method,
    path: String,
    route: OnceLock<RouteSnapshot>,
}

impl RequestScope {
    #[must_use]
    pub fn new(request_id: RequestId, method: Method, path: &str) -> Self {
        Self {
            request_id,
            method,
            path: path.to_string(),
            route: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `None` until route resolution succeeded.
    #[must_use]
    pub fn route(&self) -> Option<&RouteSnapshot> {
        self.route.get()
    }

    pub(crate) fn bind_route(&self, snapshot: RouteSnapshot) {
        if self.route.set(snapshot).is_err() {
            debug!(path = %self.path, "Request scope already bound to a route");
        }
    }
}

/// Handle to one ambient storage slot, created when the pipeline is frozen
/// with context storage enabled.
#[derive(Debug)]
pub struct ContextStorage {
    id: u64,
}

impl Default for ContextStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_STORAGE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Bind `scope` until the returned guard is dropped. Scopes nest.
    #[must_use = "the scope is unbound when the guard is dropped"]
    pub fn enter(&self, scope: Arc<RequestScope>) -> ScopeGuard {
        ACTIVE_SCOPES.with(|scopes| scopes.borrow_mut().push((self.id, scope)));
        ScopeGuard { id: self.id }
    }

    /// The innermost scope bound by this storage in the current coroutine.
    #[must_use]
    pub fn current(&self) -> Option<Arc<RequestScope>> {
        ACTIVE_SCOPES.with(|scopes| {
            scopes
                .borrow()
                .iter()
                .rev()
                .find(|(id, _)| *id == self.id)
                .map(|(_, scope)| Arc::clone(scope))
        })
    }
}

/// Unbinds a scope on drop.
#[derive(Debug)]
pub struct ScopeGuard {
    id: u64,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        ACTIVE_SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            if let Some(pos) = scopes.iter().rposition(|(id, _)| *id == self.id) {
                scopes.remove(pos);
            }
        });
    }
}
