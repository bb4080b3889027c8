//! # Request Context
//!
//! [`RequestContext`] is the single mutable object handed to every hook,
//! middleware and handler while a request travels through the pipeline. It
//! owns the incoming [`Request`], the [`Response`] being built, the params
//! captured by the router and a free-form `locals` map for passing data
//! between stages.
//!
//! With context storage enabled the same request is also reachable ambiently
//! through [`ContextStorage::current`].

mod request;
mod response;
mod storage;

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

pub use self::request::{HeaderVec, Request, MAX_INLINE_HEADERS};
pub use self::response::{Body, Response};
pub use self::storage::{ContextStorage, RequestScope, RouteSnapshot, ScopeGuard};

use crate::ids::RequestId;
use crate::router::{ParamVec, RouteMatch, RouteRecord};

/// Header carrying the request id when none is configured.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub request: Request,
    pub response: Response,
    /// Data shared between stages of this request.
    pub locals: Map<String, Value>,
    params: ParamVec,
    subdomains: ParamVec,
    route: Option<Arc<RouteRecord>>,
    route_key: Option<Arc<str>>,
    started_at: Instant,
}

impl RequestContext {
    /// Context for `request`, reusing its `x-request-id` when valid.
    #[must_use]
    pub fn new(request: Request) -> Self {
        let request_id = RequestId::from_header(request.header(DEFAULT_REQUEST_ID_HEADER));
        Self::with_request_id(request, request_id)
    }

    #[must_use]
    pub fn with_request_id(request: Request, request_id: RequestId) -> Self {
        Self {
            request_id,
            request,
            response: Response::new(),
            locals: Map::new(),
            params: ParamVec::new(),
            subdomains: ParamVec::new(),
            route: None,
            route_key: None,
            started_at: Instant::now(),
        }
    }

    /// Captured path param. Last occurrence wins.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Captured path param as a string slice, when it is one.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// Dynamic label captured from the hostname.
    #[must_use]
    pub fn subdomain(&self, name: &str) -> Option<&Value> {
        self.subdomains
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn subdomains(&self) -> &ParamVec {
        &self.subdomains
    }

    /// The matched route. `None` before resolution or when nothing matched.
    #[must_use]
    pub fn route(&self) -> Option<&Arc<RouteRecord>> {
        self.route.as_ref()
    }

    #[must_use]
    pub fn route_key(&self) -> Option<&str> {
        self.route_key.as_deref()
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Attach a route match.
    pub(crate) fn bind(&mut self, found: RouteMatch) {
        self.params = found.params;
        self.subdomains = found.subdomains;
        self.route = Some(found.route);
        self.route_key = Some(found.route_key);
    }

    /// Route facts for ambient storage.
    pub(crate) fn route_snapshot(&self) -> Option<RouteSnapshot> {
        let route = self.route.as_ref()?;
        Some(RouteSnapshot {
            route_key: Arc::clone(self.route_key.as_ref()?),
            pattern: route.pattern.clone(),
            name: route.name.clone(),
            params: self.params.clone(),
            subdomains: self.subdomains.clone(),
        })
    }
}
