//! Reverse lookup index: identifier → route, per domain.
//!
//! An identifier is a route name, a route pattern or a handler identity
//! (`Controller.method`). Routes are searched in registration order and the
//! first one matching any of the three wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::core::{RouteMeta, RouteRecord};
use super::tokenizer::Token;
use crate::error::LookupError;

/// Serializable view of a registered route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDefinition {
    pub name: Option<String>,
    pub pattern: String,
    pub methods: Vec<String>,
    pub domain: String,
    /// `Controller.method` for controller handlers, `None` for closures.
    pub handler: Option<String>,
    /// Number of route-level middleware.
    pub middleware: usize,
    pub meta: RouteMeta,
    pub tokens: Vec<Token>,
}

/// Routes of a single domain.
#[derive(Default)]
pub struct RouteFinder {
    routes: Vec<Arc<RouteRecord>>,
}

impl RouteFinder {
    pub fn register(&mut self, route: Arc<RouteRecord>) {
        self.routes.push(route);
    }

    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&Arc<RouteRecord>> {
        self.routes.iter().find(|route| {
            route.name.as_deref() == Some(identifier)
                || route.pattern == identifier
                || route.handler.matches_identity(identifier)
        })
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<RouteRecord>> {
        self.routes
            .iter()
            .find(|route| route.name.as_deref() == Some(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteRecord>> {
        self.routes.iter()
    }
}

/// One [`RouteFinder`] per domain, created on first registration.
#[derive(Default)]
pub struct RouteLookup {
    finders: HashMap<String, RouteFinder>,
    /// Domains in first-registration order, for stable output.
    domains: Vec<String>,
}

impl RouteLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, route: Arc<RouteRecord>) {
        if !self.finders.contains_key(&route.domain) {
            self.domains.push(route.domain.clone());
        }
        self.finders
            .entry(route.domain.clone())
            .or_default()
            .register(route);
    }

    #[must_use]
    pub fn finder(&self, domain: &str) -> Option<&RouteFinder> {
        self.finders.get(domain)
    }

    #[must_use]
    pub fn find(&self, domain: &str, identifier: &str) -> Option<&Arc<RouteRecord>> {
        self.finders.get(domain)?.find(identifier)
    }

    pub fn find_or_fail(&self, domain: &str, identifier: &str) -> Result<&Arc<RouteRecord>, LookupError> {
        self.find(domain, identifier)
            .ok_or_else(|| LookupError::CannotLookupRoute {
                identifier: identifier.to_string(),
                domain: domain.to_string(),
            })
    }

    #[must_use]
    pub fn has(&self, domain: &str, identifier: &str) -> bool {
        self.find(domain, identifier).is_some()
    }

    #[must_use]
    pub fn find_by_name(&self, domain: &str, name: &str) -> Option<&Arc<RouteRecord>> {
        self.finders.get(domain)?.find_by_name(name)
    }

    /// Every route, domain by domain, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteRecord>> {
        self.domains
            .iter()
            .filter_map(|domain| self.finders.get(domain))
            .flat_map(RouteFinder::iter)
    }

    /// `{ domain: [definition, ...] }`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for domain in &self.domains {
            let Some(finder) = self.finders.get(domain) else {
                continue;
            };
            let definitions: Vec<Value> = finder
                .iter()
                .filter_map(|route| serde_json::to_value(route.definition()).ok())
                .collect();
            out.insert(domain.clone(), Value::Array(definitions));
        }
        Value::Object(out)
    }
}
