//! Pattern tokenizer.
//!
//! Turns a route pattern such as `/users/:id/files/*` (or a domain pattern such
//! as `:tenant.example.com`) into an ordered list of [`Token`]s:
//!
//! | Segment     | Kind                         | Param name |
//! |-------------|------------------------------|------------|
//! | `users`     | [`TokenKind::Static`]        | -          |
//! | `:id`       | [`TokenKind::Param`]         | `id`       |
//! | `:id?`      | [`TokenKind::OptionalParam`] | `id`       |
//! | `*`         | [`TokenKind::Wildcard`]      | `*`        |
//! | `*rest`     | [`TokenKind::Wildcard`]      | `rest`     |
//!
//! Params and wildcards pick up a [`Matcher`] from the caller-supplied map,
//! keyed by param name. Tokenizing is pure; it fails only on malformed
//! patterns and duplicate param names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::RouteError;

/// Path segment separator.
pub const PATH_SEPARATOR: char = '/';
/// Domain label separator.
pub const DOMAIN_SEPARATOR: char = '.';

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("number matcher regex"));
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid matcher regex")
});
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug matcher regex"));

/// Converts a captured raw segment into a typed value.
pub type CastFn = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// Converts a typed value back into a raw segment when building URLs.
pub type ReverseCastFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Validation regex plus optional value casts, bound to a named param.
#[derive(Clone)]
pub struct Matcher {
    regex: Regex,
    cast: Option<CastFn>,
    reverse: Option<ReverseCastFn>,
}

impl Matcher {
    /// Matcher from a regex source. The regex is used as supplied, it is not
    /// implicitly anchored.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(Regex::new(pattern)?))
    }

    /// Matcher from an already compiled regex.
    #[must_use]
    pub fn from_regex(regex: Regex) -> Self {
        Self {
            regex,
            cast: None,
            reverse: None,
        }
    }

    /// Attach a cast applied to the captured value after a successful match.
    #[must_use]
    pub fn with_cast<F>(mut self, cast: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        self.cast = Some(Arc::new(cast));
        self
    }

    /// Attach the inverse of the cast, used by the URL builder to turn a
    /// param value back into a segment. Without one, strings are used as is
    /// and other values in their JSON form.
    #[must_use]
    pub fn with_reverse_cast<F>(mut self, reverse: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.reverse = Some(Arc::new(reverse));
        self
    }

    /// Digits only, cast to an integer.
    #[must_use]
    pub fn number() -> Self {
        Self::from_regex(NUMBER_RE.clone()).with_cast(|raw| {
            raw.parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string()))
        })
    }

    /// Hyphenated UUID of any version.
    #[must_use]
    pub fn uuid() -> Self {
        Self::from_regex(UUID_RE.clone()).with_cast(|raw| Value::String(raw.to_lowercase()))
    }

    /// Lowercase words joined by single hyphens.
    #[must_use]
    pub fn slug() -> Self {
        Self::from_regex(SLUG_RE.clone())
    }

    #[inline]
    #[must_use]
    pub fn is_match(&self, segment: &str) -> bool {
        self.regex.is_match(segment)
    }

    /// Apply the cast, or keep the raw string when there is none.
    #[must_use]
    pub fn cast(&self, raw: &str) -> Value {
        match &self.cast {
            Some(cast) => cast(raw),
            None => Value::String(raw.to_string()),
        }
    }

    /// Segment for a param value, when a reverse cast is attached.
    #[must_use]
    pub fn reverse_cast(&self, value: &Value) -> Option<String> {
        self.reverse.as_ref().map(|reverse| reverse(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("regex", &self.regex.as_str())
            .field("cast", &self.cast.is_some())
            .field("reverse", &self.reverse.is_some())
            .finish()
    }
}

/// Per-param matchers supplied at registration.
pub type Matchers = HashMap<String, Matcher>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Static,
    Param,
    OptionalParam,
    Wildcard,
}

/// One parsed pattern segment.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Segment text exactly as written in the pattern.
    pub raw: Arc<str>,
    /// Param name for param and wildcard tokens.
    pub name: Option<Arc<str>>,
    #[serde(skip)]
    pub matcher: Option<Matcher>,
}

impl Token {
    #[inline]
    #[must_use]
    pub fn is_param(&self) -> bool {
        !matches!(self.kind, TokenKind::Static)
    }

    /// Whether a single non-empty segment satisfies this param token.
    #[inline]
    #[must_use]
    pub fn accepts(&self, segment: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(segment),
            None => !segment.is_empty(),
        }
    }

    /// Typed value for a captured segment.
    #[must_use]
    pub fn cast(&self, raw: &str) -> Value {
        match &self.matcher {
            Some(matcher) => matcher.cast(raw),
            None => Value::String(raw.to_string()),
        }
    }

    /// Raw segment for a param value, through the matcher's reverse cast.
    #[must_use]
    pub fn reverse_cast(&self, value: &Value) -> Option<String> {
        self.matcher.as_ref()?.reverse_cast(value)
    }
}

/// Tokenize a URL path pattern.
pub fn tokenize(pattern: &str, matchers: &Matchers) -> Result<Vec<Token>, RouteError> {
    tokenize_with(pattern, PATH_SEPARATOR, matchers)
}

/// Tokenize a domain pattern, using `.` as the separator.
pub fn tokenize_domain(pattern: &str, matchers: &Matchers) -> Result<Vec<Token>, RouteError> {
    tokenize_with(pattern, DOMAIN_SEPARATOR, matchers)
}

fn tokenize_with(
    pattern: &str,
    separator: char,
    matchers: &Matchers,
) -> Result<Vec<Token>, RouteError> {
    let invalid = |reason: &str| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = pattern
        .split(separator)
        .filter(|s| !s.is_empty())
        .collect();
    let mut tokens: Vec<Token> = Vec::with_capacity(segments.len());

    for (idx, segment) in segments.iter().enumerate() {
        let (kind, name) = if let Some(rest) = segment.strip_prefix(':') {
            match rest.strip_suffix('?') {
                Some(name) => (TokenKind::OptionalParam, name),
                None => (TokenKind::Param, rest),
            }
        } else if let Some(rest) = segment.strip_prefix('*') {
            if idx + 1 != segments.len() {
                return Err(invalid("wildcard must be the last segment"));
            }
            (TokenKind::Wildcard, if rest.is_empty() { "*" } else { rest })
        } else {
            tokens.push(Token {
                kind: TokenKind::Static,
                raw: Arc::from(*segment),
                name: None,
                matcher: None,
            });
            continue;
        };

        if name.is_empty() {
            return Err(invalid("param name cannot be empty"));
        }
        if tokens
            .iter()
            .any(|t| t.name.as_deref() == Some(name))
        {
            return Err(RouteError::DuplicateRouteParam {
                param: name.to_string(),
                pattern: pattern.to_string(),
            });
        }

        tokens.push(Token {
            kind,
            raw: Arc::from(*segment),
            name: Some(Arc::from(name)),
            matcher: matchers.get(name).cloned(),
        });
    }

    Ok(tokens)
}

/// Ordered param names of a token list.
#[must_use]
pub fn param_names(tokens: &[Token]) -> Vec<Arc<str>> {
    tokens
        .iter()
        .filter_map(|t| t.name.as_ref().map(Arc::clone))
        .collect()
}
