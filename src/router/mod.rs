//! # Router Module
//!
//! Route table, reverse lookup index and URL builder.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Tokenizing route patterns (`/posts/:id`, `/files/*`, `:tenant.example.com`)
//! - Storing routes per domain and per method, in registration order
//! - Matching an incoming (method, path, hostname) to a route and capturing params
//! - Finding routes again by name, pattern or handler identity
//! - Building URLs for a route from named or positional params
//!
//! ## Architecture
//!
//! ```text
//! Route ──tokenize──▶ RouteRecord ──┬──▶ RouteStore   domain → method → [record]
//!                                   └──▶ RouteLookup  domain → [record]
//! ```
//!
//! Both indexes share the same `Arc<RouteRecord>`. Matching walks the method
//! bucket of the resolved domain and returns the first record whose tokens
//! accept every segment of the path.
//!
//! ## Example
//!
//! ```rust,ignore
//! use switchyard::router::{Route, Router};
//! use switchyard::handler::HandlerRef;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add(Route::get("/users/:id", HandlerRef::function(show_user)).name("users.show"))?;
//!
//! let found = router.route(&Method::GET, "/users/42", None).unwrap();
//! assert_eq!(&*found.route_key, "GET-/users/:id");
//!
//! let url = router.builder().params(json!([42])).make("users.show")?;
//! assert_eq!(url, "/users/42");
//! ```
//!
//! ## Performance
//!
//! Matching is linear in the number of routes of a method bucket, each
//! candidate rejected at its first mismatching segment. Param captures live
//! in a `SmallVec` and route keys are precomputed, so a match allocates only
//! the captured values. Slow matches are logged at `warn`.

mod core;
mod lookup;
mod matcher;
mod store;
mod tokenizer;
mod url_builder;

pub use self::core::{Route, RouteMatch, RouteMeta, RouteRecord, Router, DEFAULT_SLOW_MATCH, ROOT_DOMAIN};
pub use self::lookup::{RouteDefinition, RouteFinder, RouteLookup};
pub use self::matcher::{
    match_tokens, split_host, split_path, ParamVec, Segments, MAX_INLINE_PARAMS,
    MAX_INLINE_SEGMENTS,
};
pub use self::store::{route_key, DomainMatch, RouteStore};
pub use self::tokenizer::{
    param_names, tokenize, tokenize_domain, CastFn, Matcher, Matchers, ReverseCastFn, Token,
    TokenKind, DOMAIN_SEPARATOR, PATH_SEPARATOR,
};
pub use self::url_builder::{SignOptions, UrlBuilder, UrlSigner, SIGNATURE_PARAM};
