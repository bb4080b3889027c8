use std::sync::Arc;

use http::Method;
use serde_json::Value;
use smallvec::SmallVec;

/// Maximum inline headers before heap allocation. Most requests carry
/// fewer than 16.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header (or query pair) storage. Names are lowercase `Arc<str>`, values
/// are per-request strings.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Incoming request as seen by hooks, middleware and handlers.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    query_params: HeaderVec,
    headers: HeaderVec,
    body: Option<Value>,
}

impl Request {
    /// Build a request from a method and a request target (`/path?query`).
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let query_params = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query: query.map(str::to_string),
            query_params,
            headers: HeaderVec::new(),
            body: None,
        }
    }

    /// Add a header. Names are stored lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.push_header(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn push_header(&mut self, name: &str, value: &str) {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path without the query string.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, without the leading `?`.
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded query param. Last occurrence wins.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_params(&self) -> &HeaderVec {
        &self.query_params
    }

    /// Header value, case-insensitive.
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Cookie value parsed from the `Cookie` header.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header("cookie")?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
    }

    /// Host header, including any port.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.header("host")
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}
