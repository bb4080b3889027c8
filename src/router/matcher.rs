//! Segment-by-segment matching of token lists.
//!
//! The same walk is used for URL paths (segments split on `/`) and for
//! hostnames (labels split on `.`). Matching never allocates on the heap for
//! up to [`MAX_INLINE_SEGMENTS`] segments and [`MAX_INLINE_PARAMS`] captures;
//! captured values are only converted to owned [`Value`]s once a token list
//! has fully matched.

use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use super::tokenizer::{Token, TokenKind, DOMAIN_SEPARATOR, PATH_SEPARATOR};

/// Maximum number of path/domain params before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum number of URL segments before heap allocation.
pub const MAX_INLINE_SEGMENTS: usize = 16;

/// Captured params keyed by name, in pattern order.
///
/// Param names are `Arc<str>` shared with the route table; values are raw
/// strings, or whatever the matcher's cast produced.
pub type ParamVec = SmallVec<[(Arc<str>, Value); MAX_INLINE_PARAMS]>;

/// Borrowed URL segments.
pub type Segments<'a> = SmallVec<[&'a str; MAX_INLINE_SEGMENTS]>;

/// Split a URL path into non-empty segments.
#[inline]
#[must_use]
pub fn split_path(path: &str) -> Segments<'_> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Split a hostname into labels, dropping any `:port` suffix.
#[inline]
#[must_use]
pub fn split_host(host: &str) -> Segments<'_> {
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    host.split(DOMAIN_SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect()
}

enum Capture<'a> {
    One(&'a str),
    Rest(&'a [&'a str]),
}

/// Match `segments` against `tokens`.
///
/// - static tokens require exact equality
/// - param tokens consume one segment satisfying the token's matcher
/// - optional params consume one segment when present, nothing once the URL
///   is exhausted
/// - a wildcard consumes everything that is left, including nothing
///
/// Returns `None` on mismatch, otherwise the captured params.
#[must_use]
pub fn match_tokens(tokens: &[Token], segments: &[&str]) -> Option<ParamVec> {
    let mut captures: SmallVec<[(&Token, Capture<'_>); MAX_INLINE_PARAMS]> = SmallVec::new();
    let mut cursor = 0;

    for token in tokens {
        match token.kind {
            TokenKind::Static => {
                let segment = segments.get(cursor)?;
                if *segment != &*token.raw {
                    return None;
                }
                cursor += 1;
            }
            TokenKind::Param => {
                let segment = segments.get(cursor)?;
                if !token.accepts(segment) {
                    return None;
                }
                captures.push((token, Capture::One(segment)));
                cursor += 1;
            }
            TokenKind::OptionalParam => {
                if let Some(segment) = segments.get(cursor) {
                    if !token.accepts(segment) {
                        return None;
                    }
                    captures.push((token, Capture::One(segment)));
                    cursor += 1;
                }
            }
            TokenKind::Wildcard => {
                captures.push((token, Capture::Rest(&segments[cursor..])));
                cursor = segments.len();
            }
        }
    }

    if cursor != segments.len() {
        return None;
    }

    let params = captures
        .into_iter()
        .filter_map(|(token, capture)| {
            let name = token.name.as_ref().map(Arc::clone)?;
            let value = match capture {
                Capture::One(raw) => token.cast(raw),
                Capture::Rest(rest) => Value::String(rest.join("/")),
            };
            Some((name, value))
        })
        .collect();

    Some(params)
}
