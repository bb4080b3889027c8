//! Route table: domain → method → ordered route list.
//!
//! Routes are kept in registration order inside each method bucket and
//! matched first-registered-wins. The route key used by metrics and
//! middleware is built once at insertion time so matching never formats
//! strings.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use super::core::{RouteMatch, RouteRecord, ROOT_DOMAIN};
use super::matcher::{match_tokens, split_host, split_path, ParamVec};
use super::tokenizer::{tokenize_domain, Matchers, Token};
use crate::error::RouteError;

struct Entry {
    route_key: Arc<str>,
    record: Arc<RouteRecord>,
}

#[derive(Default)]
struct DomainNode {
    methods: HashMap<Method, Vec<Entry>>,
}

/// A hostname resolved against the registered domain patterns.
#[derive(Debug, Clone)]
pub struct DomainMatch {
    /// The domain pattern exactly as registered.
    pub domain: Arc<str>,
    /// Dynamic labels captured from the hostname.
    pub subdomains: ParamVec,
}

/// Build the key identifying a (domain, method, pattern) triple.
#[must_use]
pub fn route_key(domain: &str, method: &Method, pattern: &str) -> String {
    if domain == ROOT_DOMAIN {
        format!("{method}-{pattern}")
    } else {
        format!("{domain}-{method}-{pattern}")
    }
}

pub struct RouteStore {
    domains: HashMap<Arc<str>, DomainNode>,
    /// Non-root domain patterns in first-seen order.
    domain_patterns: Vec<(Arc<str>, Vec<Token>)>,
    len: usize,
}

impl Default for RouteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStore {
    #[must_use]
    pub fn new() -> Self {
        let mut domains = HashMap::new();
        domains.insert(Arc::from(ROOT_DOMAIN), DomainNode::default());
        Self {
            domains,
            domain_patterns: Vec::new(),
            len: 0,
        }
    }

    /// Insert a tokenized route under every one of its methods.
    ///
    /// Fails without touching the table when any (domain, method, pattern)
    /// triple is already taken.
    pub fn add(&mut self, record: Arc<RouteRecord>, matchers: &Matchers) -> Result<(), RouteError> {
        if let Some(node) = self.domains.get(record.domain.as_str()) {
            for method in &record.methods {
                let taken = node
                    .methods
                    .get(method)
                    .is_some_and(|entries| entries.iter().any(|e| e.record.pattern == record.pattern));
                if taken {
                    return Err(RouteError::DuplicateRoute {
                        domain: record.domain.clone(),
                        method: method.clone(),
                        pattern: record.pattern.clone(),
                    });
                }
            }
        }

        let domain: Arc<str> = Arc::from(record.domain.as_str());
        if domain.as_ref() != ROOT_DOMAIN
            && !self.domain_patterns.iter().any(|(d, _)| *d == domain)
        {
            let tokens = tokenize_domain(&domain, matchers)?;
            debug!(domain = %domain, labels = tokens.len(), "Domain pattern registered");
            self.domain_patterns.push((Arc::clone(&domain), tokens));
        }

        let node = self.domains.entry(Arc::clone(&domain)).or_default();
        for method in &record.methods {
            let key = route_key(&record.domain, method, &record.pattern);
            node.methods.entry(method.clone()).or_default().push(Entry {
                route_key: Arc::from(key),
                record: Arc::clone(&record),
            });
        }
        self.len += 1;
        Ok(())
    }

    /// Whether any non-root domain has been registered.
    #[inline]
    #[must_use]
    pub fn uses_domains(&self) -> bool {
        !self.domain_patterns.is_empty()
    }

    /// Number of registered routes (not method entries).
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolve a hostname against the registered domain patterns.
    ///
    /// Returns `None` straight away when only the root domain exists.
    #[must_use]
    pub fn match_domain(&self, hostname: &str) -> Option<DomainMatch> {
        if !self.uses_domains() {
            return None;
        }
        let labels = split_host(hostname);
        self.domain_patterns.iter().find_map(|(domain, tokens)| {
            match_tokens(tokens, &labels).map(|subdomains| DomainMatch {
                domain: Arc::clone(domain),
                subdomains,
            })
        })
    }

    /// Match a path and method inside the given domain, or the root domain
    /// when no domain matched.
    #[must_use]
    pub fn match_route(
        &self,
        path: &str,
        method: &Method,
        domain: Option<&DomainMatch>,
    ) -> Option<RouteMatch> {
        let node_key = domain.map_or(ROOT_DOMAIN, |d| d.domain.as_ref());
        let entries = self.domains.get(node_key)?.methods.get(method)?;
        let segments = split_path(path);

        entries.iter().find_map(|entry| {
            match_tokens(&entry.record.tokens, &segments).map(|params| RouteMatch {
                route: Arc::clone(&entry.record),
                route_key: Arc::clone(&entry.route_key),
                params,
                subdomains: domain.map(|d| d.subdomains.clone()).unwrap_or_default(),
            })
        })
    }
}
