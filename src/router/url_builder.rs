//! Reverse routing: build a URL for a named route.
//!
//! ```rust,ignore
//! let url = router
//!     .builder()
//!     .params(json!({ "id": 42 }))
//!     .qs(json!({ "tab": "comments" }))
//!     .make("posts.show")?;
//! assert_eq!(url, "/posts/42?tab=comments");
//! ```
//!
//! Params are either named (a JSON object keyed by param name) or positional
//! (a JSON array consumed in pattern order). A param whose matcher carries a
//! reverse cast is rendered through it; otherwise strings are used as is and
//! other values in their JSON form. Every segment is percent-encoded;
//! wildcard values are encoded part by part and joined with `/`.

use std::time::Duration;

use serde_json::{Map, Value};
use url::form_urlencoded;

use super::lookup::RouteLookup;
use super::matcher::ParamVec;
use super::tokenizer::{tokenize, Matchers, Token, TokenKind};
use crate::error::LookupError;

/// Query-string key the signature is stored under.
pub const SIGNATURE_PARAM: &str = "signature";

/// Options forwarded to a [`UrlSigner`].
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    pub expires_in: Option<Duration>,
    pub purpose: Option<String>,
}

/// Produces the signature appended by [`UrlBuilder::make_signed`].
pub trait UrlSigner: Send + Sync {
    /// Sign the URL (path plus any query string, without prefix).
    fn sign(&self, url: &str, options: &SignOptions) -> anyhow::Result<String>;
}

enum Params {
    Named(Map<String, Value>),
    Positional(Vec<Value>),
}

/// Fluent URL builder bound to one domain of the lookup index.
///
/// Cheap to create; obtain one per URL via [`Router::builder`](super::Router::builder).
pub struct UrlBuilder<'r> {
    lookup: &'r RouteLookup,
    domain: String,
    params: Params,
    qs: Map<String, Value>,
    prefix: Option<String>,
    lookup_enabled: bool,
}

impl<'r> UrlBuilder<'r> {
    #[must_use]
    pub fn new(lookup: &'r RouteLookup, domain: &str) -> Self {
        Self {
            lookup,
            domain: domain.to_string(),
            params: Params::Named(Map::new()),
            qs: Map::new(),
            prefix: None,
            lookup_enabled: true,
        }
    }

    /// Named params from an object, positional params from an array.
    /// Anything else clears the params.
    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.params = match params {
            Value::Object(map) => Params::Named(map),
            Value::Array(values) => Params::Positional(values),
            _ => Params::Named(Map::new()),
        };
        self
    }

    /// Reuse the params captured by the current request.
    #[must_use]
    pub fn params_from(mut self, captured: &ParamVec) -> Self {
        let map = captured
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.params = Params::Named(map);
        self
    }

    /// Query string values. Arrays are repeated as `key=a&key=b`.
    #[must_use]
    pub fn qs(mut self, qs: Value) -> Self {
        if let Value::Object(map) = qs {
            self.qs = map;
        }
        self
    }

    /// Prepended verbatim (minus a trailing `/`), e.g. `https://example.com`.
    #[must_use]
    pub fn prefix_url(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.trim_end_matches('/').to_string());
        self
    }

    /// Treat the identifier as a raw pattern instead of looking it up.
    #[must_use]
    pub fn disable_route_lookup(mut self) -> Self {
        self.lookup_enabled = false;
        self
    }

    /// Build the URL for `identifier`.
    pub fn make(&self, identifier: &str) -> Result<String, LookupError> {
        let path = self.build_path(identifier)?;
        let mut url = path;
        if let Some(query) = encode_query(&self.qs) {
            url.push('?');
            url.push_str(&query);
        }
        Ok(self.with_prefix(url))
    }

    /// Build the URL and append a `signature` query param produced by
    /// `signer`. The prefix is not part of the signed input.
    pub fn make_signed(
        &self,
        identifier: &str,
        signer: &dyn UrlSigner,
        options: &SignOptions,
    ) -> Result<String, LookupError> {
        let path = self.build_path(identifier)?;
        let mut qs = self.qs.clone();
        qs.remove(SIGNATURE_PARAM);

        let unsigned = match encode_query(&qs) {
            Some(query) => format!("{path}?{query}"),
            None => path.clone(),
        };
        let signature = signer
            .sign(&unsigned, options)
            .map_err(|source| LookupError::Signing {
                identifier: identifier.to_string(),
                source,
            })?;
        qs.insert(SIGNATURE_PARAM.to_string(), Value::String(signature));

        let query = encode_query(&qs).unwrap_or_default();
        Ok(self.with_prefix(format!("{path}?{query}")))
    }

    fn with_prefix(&self, url: String) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{url}"),
            None => url,
        }
    }

    fn build_path(&self, identifier: &str) -> Result<String, LookupError> {
        if self.lookup_enabled {
            let route = self.lookup.find_or_fail(&self.domain, identifier)?;
            self.render(&route.tokens, &route.pattern)
        } else {
            let tokens = tokenize(identifier, &Matchers::new())?;
            self.render(&tokens, identifier)
        }
    }

    fn render(&self, tokens: &[Token], pattern: &str) -> Result<String, LookupError> {
        let mut url = String::with_capacity(pattern.len() + 16);
        let mut position = 0;

        for token in tokens {
            let Some(name) = token.name.as_deref() else {
                url.push('/');
                url.push_str(&token.raw);
                continue;
            };

            let value = match &self.params {
                Params::Named(map) => map.get(name),
                Params::Positional(values) => values.get(position),
            }
            .filter(|v| !v.is_null());
            position += 1;

            let Some(value) = value else {
                if token.kind == TokenKind::OptionalParam {
                    continue;
                }
                return Err(LookupError::CannotMakeUrl {
                    param: name.to_string(),
                    pattern: pattern.to_string(),
                });
            };

            if token.kind == TokenKind::Wildcard {
                for part in wildcard_parts(value) {
                    url.push('/');
                    url.push_str(&urlencoding::encode(&part));
                }
            } else {
                let segment = token.reverse_cast(value).unwrap_or_else(|| scalar(value));
                url.push('/');
                url.push_str(&urlencoding::encode(&segment));
            }
        }

        if url.is_empty() {
            url.push('/');
        }
        Ok(url)
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn wildcard_parts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar).collect(),
        Value::String(s) => s
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        other => vec![scalar(other)],
    }
}

fn encode_query(qs: &Map<String, Value>) -> Option<String> {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in qs {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    serializer.append_pair(key, &scalar(item));
                    any = true;
                }
            }
            other => {
                serializer.append_pair(key, &scalar(other));
                any = true;
            }
        }
    }
    any.then(|| serializer.finish())
}
