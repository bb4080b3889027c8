use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::lookup::{RouteDefinition, RouteLookup};
use super::matcher::ParamVec;
use super::store::{DomainMatch, RouteStore};
use super::tokenizer::{param_names, tokenize, Matcher, Matchers, Token};
use super::url_builder::UrlBuilder;
use crate::error::{LookupError, RouteError};
use crate::handler::HandlerRef;
use crate::middleware::Middleware;

/// Domain used by routes registered without one.
pub const ROOT_DOMAIN: &str = "root";

/// Default threshold above which a match is logged as slow.
pub const DEFAULT_SLOW_MATCH: Duration = Duration::from_millis(1);

/// Route registration input.
///
/// ```rust,ignore
/// let route = Route::get("/posts/:id", HandlerRef::function(show_post))
///     .name("posts.show")
///     .matcher("id", Matcher::number());
/// router.add(route)?;
/// ```
pub struct Route {
    pattern: String,
    methods: Vec<Method>,
    handler: HandlerRef,
    domain: String,
    name: Option<String>,
    matchers: Matchers,
    middleware: Vec<Arc<dyn Middleware>>,
    meta: Map<String, Value>,
}

impl Route {
    pub fn new(methods: Vec<Method>, pattern: &str, handler: HandlerRef) -> Self {
        Self {
            pattern: normalize_pattern(pattern),
            methods,
            handler,
            domain: ROOT_DOMAIN.to_string(),
            name: None,
            matchers: Matchers::new(),
            middleware: Vec::new(),
            meta: Map::new(),
        }
    }

    /// `GET` route. `HEAD` requests are matched against it too.
    pub fn get(pattern: &str, handler: HandlerRef) -> Self {
        Self::new(vec![Method::GET, Method::HEAD], pattern, handler)
    }

    pub fn post(pattern: &str, handler: HandlerRef) -> Self {
        Self::new(vec![Method::POST], pattern, handler)
    }

    pub fn put(pattern: &str, handler: HandlerRef) -> Self {
        Self::new(vec![Method::PUT], pattern, handler)
    }

    pub fn patch(pattern: &str, handler: HandlerRef) -> Self {
        Self::new(vec![Method::PATCH], pattern, handler)
    }

    pub fn delete(pattern: &str, handler: HandlerRef) -> Self {
        Self::new(vec![Method::DELETE], pattern, handler)
    }

    /// Every standard method.
    pub fn any(pattern: &str, handler: HandlerRef) -> Self {
        Self::new(
            vec![
                Method::HEAD,
                Method::OPTIONS,
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ],
            pattern,
            handler,
        )
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    #[must_use]
    pub fn matcher(mut self, param: &str, matcher: Matcher) -> Self {
        self.matchers.insert(param.to_string(), matcher);
        self
    }

    /// Matcher from a regex source; fails on an invalid regex.
    pub fn where_regex(self, param: &str, regex: &str) -> Result<Self, RouteError> {
        let matcher = Matcher::new(regex).map_err(|source| RouteError::InvalidMatcher {
            param: param.to_string(),
            source,
        })?;
        Ok(self.matcher(param, matcher))
    }

    /// Append route-level middleware. Runs after global middleware, in the
    /// order added.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Free-form metadata copied into [`RouteMeta::extra`].
    #[must_use]
    pub fn meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }

    /// Tokenize and validate, producing the record stored by the table and
    /// the matchers needed to tokenize its domain.
    pub fn into_record(self) -> Result<(RouteRecord, Matchers), RouteError> {
        if self.methods.is_empty() {
            return Err(RouteError::MissingMethods {
                pattern: self.pattern,
            });
        }
        let tokens = tokenize(&self.pattern, &self.matchers)?;
        let record = RouteRecord {
            meta: RouteMeta {
                params: param_names(&tokens),
                extra: self.meta,
            },
            pattern: self.pattern,
            tokens,
            methods: self.methods,
            domain: self.domain,
            name: self.name,
            handler: self.handler,
            middleware: self.middleware,
        };
        Ok((record, self.matchers))
    }
}

fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Data attached to a route at registration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteMeta {
    /// Param names in pattern order.
    pub params: Vec<Arc<str>>,
    /// Free-form registration metadata.
    pub extra: Map<String, Value>,
}

/// A registered route, shared between the table, the lookup index and
/// every request it matches.
pub struct RouteRecord {
    pub pattern: String,
    pub tokens: Vec<Token>,
    pub methods: Vec<Method>,
    pub domain: String,
    pub name: Option<String>,
    pub handler: HandlerRef,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub meta: RouteMeta,
}

impl RouteRecord {
    /// Serializable view of this route.
    #[must_use]
    pub fn definition(&self) -> RouteDefinition {
        RouteDefinition {
            name: self.name.clone(),
            pattern: self.pattern.clone(),
            methods: self.methods.iter().map(|m| m.as_str().to_string()).collect(),
            domain: self.domain.clone(),
            handler: self.handler.identity(),
            middleware: self.middleware.len(),
            meta: self.meta.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl fmt::Debug for RouteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRecord")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("handler", &self.handler)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Result of a successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteRecord>,
    /// `METHOD-pattern`, prefixed with `domain-` outside the root domain.
    pub route_key: Arc<str>,
    pub params: ParamVec,
    pub subdomains: ParamVec,
}

impl RouteMatch {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }
}

/// Route table plus lookup index.
///
/// Mutable while routes are being registered; the dispatch pipeline takes it
/// by value when frozen and only reads from it afterwards.
pub struct Router {
    store: RouteStore,
    lookup: RouteLookup,
    slow_match: Duration,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: RouteStore::new(),
            lookup: RouteLookup::new(),
            slow_match: DEFAULT_SLOW_MATCH,
        }
    }

    /// Matches slower than this are logged at `warn`.
    pub fn set_slow_match_threshold(&mut self, threshold: Duration) {
        self.slow_match = threshold;
    }

    /// Register a route.
    ///
    /// Fails on a duplicate name within the domain, a duplicate
    /// (domain, method, pattern), a duplicate param or a malformed pattern.
    /// A failed registration leaves the table unchanged.
    pub fn add(&mut self, route: Route) -> Result<Arc<RouteRecord>, RouteError> {
        if let Some(name) = route.name.as_deref() {
            if self.lookup.find_by_name(&route.domain, name).is_some() {
                return Err(RouteError::DuplicateRouteName {
                    name: name.to_string(),
                    domain: route.domain.clone(),
                });
            }
        }

        let (record, matchers) = route.into_record()?;
        let record = Arc::new(record);
        self.store.add(Arc::clone(&record), &matchers)?;
        self.lookup.register(Arc::clone(&record));

        debug!(
            pattern = %record.pattern,
            methods = ?record.methods,
            domain = %record.domain,
            name = ?record.name,
            handler = ?record.handler.identity(),
            "Route registered"
        );
        Ok(record)
    }

    /// Resolve a request. `hostname` is only consulted when at least one
    /// non-root domain is registered; unmatched hostnames fall back to the
    /// root domain.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str, hostname: Option<&str>) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, host = ?hostname, "Route match attempt");

        let match_start = std::time::Instant::now();
        let domain = match hostname {
            Some(host) => self.store.match_domain(host),
            None => None,
        };
        let result = self.store.match_route(path, method, domain.as_ref());
        let match_duration = match_start.elapsed();

        if let Some(found) = result {
            if match_duration > self.slow_match {
                warn!(
                    method = %method,
                    path = %path,
                    route_key = %found.route_key,
                    path_params = ?found.params,
                    duration_us = match_duration.as_micros(),
                    "Slow route matching detected"
                );
            } else {
                info!(
                    method = %method,
                    path = %path,
                    route_key = %found.route_key,
                    path_params = ?found.params,
                    duration_us = match_duration.as_micros(),
                    "Route matched"
                );
            }
            return Some(found);
        }

        warn!(
            method = %method,
            path = %path,
            duration_us = match_duration.as_micros(),
            "No route matched"
        );
        None
    }

    #[must_use]
    pub fn match_domain(&self, hostname: &str) -> Option<DomainMatch> {
        self.store.match_domain(hostname)
    }

    #[inline]
    #[must_use]
    pub fn uses_domains(&self) -> bool {
        self.store.uses_domains()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn lookup(&self) -> &RouteLookup {
        &self.lookup
    }

    /// First root-domain route whose name, pattern or handler identity equals
    /// `identifier`.
    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&Arc<RouteRecord>> {
        self.lookup.find(ROOT_DOMAIN, identifier)
    }

    pub fn find_or_fail(&self, identifier: &str) -> Result<&Arc<RouteRecord>, LookupError> {
        self.lookup.find_or_fail(ROOT_DOMAIN, identifier)
    }

    #[must_use]
    pub fn has(&self, identifier: &str) -> bool {
        self.lookup.has(ROOT_DOMAIN, identifier)
    }

    /// [`Router::find`] on the routes registered under `domain` (the domain
    /// pattern, e.g. `:tenant.example.com`).
    #[must_use]
    pub fn find_in_domain(&self, domain: &str, identifier: &str) -> Option<&Arc<RouteRecord>> {
        self.lookup.find(domain, identifier)
    }

    pub fn find_or_fail_in_domain(
        &self,
        domain: &str,
        identifier: &str,
    ) -> Result<&Arc<RouteRecord>, LookupError> {
        self.lookup.find_or_fail(domain, identifier)
    }

    #[must_use]
    pub fn has_in_domain(&self, domain: &str, identifier: &str) -> bool {
        self.lookup.has(domain, identifier)
    }

    /// URL builder scoped to the root domain.
    #[must_use]
    pub fn builder(&self) -> UrlBuilder<'_> {
        UrlBuilder::new(&self.lookup, ROOT_DOMAIN)
    }

    #[must_use]
    pub fn builder_for_domain(&self, domain: &str) -> UrlBuilder<'_> {
        UrlBuilder::new(&self.lookup, domain)
    }

    /// Route definitions grouped by domain.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.lookup.to_json()
    }

    /// Print a human-readable route table. Useful for startup diagnostics.
    pub fn dump_routes(&self) {
        for record in self.lookup.routes() {
            let methods: Vec<&str> = record.methods.iter().map(Method::as_str).collect();
            println!(
                "[ROUTE] {:<20} {:<28} {:<20} {}",
                methods.join(","),
                record.pattern,
                record.name.as_deref().unwrap_or("-"),
                record.handler.identity().unwrap_or_else(|| "<closure>".to_string()),
            );
        }
    }
}
