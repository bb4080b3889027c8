//! Reverse routing: building URLs for named routes.

use std::time::Duration;

use serde_json::json;
use switchyard::router::{Route, Router, SignOptions, UrlSigner};
use switchyard::{LookupError, Matcher};

mod common;
use common::handlers::noop;

fn router() -> Router {
    let mut router = Router::new();
    router
        .add(Route::get("/users/:id", noop()).name("users.show"))
        .unwrap();
    router
        .add(Route::get("/users/:id/posts/:post?", noop()).name("users.posts"))
        .unwrap();
    router
        .add(Route::get("/docs/*path", noop()).name("docs"))
        .unwrap();
    router
        .add(
            Route::get("/settings", noop())
                .name("tenant.settings")
                .domain(":tenant.example.com"),
        )
        .unwrap();
    router
}

/// Signs by reversing the URL; enough to check what was signed.
struct ReverseSigner;

impl UrlSigner for ReverseSigner {
    fn sign(&self, url: &str, options: &SignOptions) -> anyhow::Result<String> {
        let mut signature: String = url.chars().rev().collect();
        if let Some(ttl) = options.expires_in {
            signature.push_str(&format!("~{}", ttl.as_secs()));
        }
        Ok(signature)
    }
}

struct FailingSigner;

impl UrlSigner for FailingSigner {
    fn sign(&self, _url: &str, _options: &SignOptions) -> anyhow::Result<String> {
        anyhow::bail!("no key configured")
    }
}

#[test]
fn test_named_params() {
    let router = router();
    let url = router
        .builder()
        .params(json!({ "id": 7 }))
        .make("users.show")
        .unwrap();
    assert_eq!(url, "/users/7");
}

#[test]
fn test_positional_params() {
    let router = router();
    let url = router
        .builder()
        .params(json!([7, "hello"]))
        .make("users.posts")
        .unwrap();
    assert_eq!(url, "/users/7/posts/hello");
}

#[test]
fn test_missing_required_param_fails() {
    let router = router();
    let err = router.builder().make("users.show").unwrap_err();
    assert!(matches!(
        err,
        LookupError::CannotMakeUrl { ref param, ref pattern } if param == "id" && pattern == "/users/:id"
    ));
}

#[test]
fn test_missing_optional_param_is_skipped() {
    let router = router();
    let url = router
        .builder()
        .params(json!({ "id": 3 }))
        .make("users.posts")
        .unwrap();
    assert_eq!(url, "/users/3/posts");
}

#[test]
fn test_unknown_identifier_fails() {
    let router = router();
    let err = router.builder().make("nope").unwrap_err();
    assert!(matches!(err, LookupError::CannotLookupRoute { .. }));
}

#[test]
fn test_lookup_by_pattern() {
    let router = router();
    let url = router
        .builder()
        .params(json!({ "id": 1 }))
        .make("/users/:id")
        .unwrap();
    assert_eq!(url, "/users/1");
}

#[test]
fn test_segments_are_encoded_independently() {
    let router = router();
    let url = router
        .builder()
        .params(json!({ "id": "a/b?c" }))
        .make("users.show")
        .unwrap();
    assert_eq!(url, "/users/a%2Fb%3Fc");
}

#[test]
fn test_wildcard_keeps_separators() {
    let router = router();
    let url = router
        .builder()
        .params(json!({ "path": "guides/intro page" }))
        .make("docs")
        .unwrap();
    assert_eq!(url, "/docs/guides/intro%20page");

    let from_parts = router
        .builder()
        .params(json!({ "path": ["a", "b c"] }))
        .make("docs")
        .unwrap();
    assert_eq!(from_parts, "/docs/a/b%20c");
}

#[test]
fn test_query_string_and_prefix() {
    let router = router();
    let url = router
        .builder()
        .params(json!({ "id": 9 }))
        .qs(json!({ "tab": "posts" }))
        .prefix_url("https://example.com/")
        .make("users.show")
        .unwrap();
    assert_eq!(url, "https://example.com/users/9?tab=posts");
}

#[test]
fn test_disable_route_lookup_uses_raw_pattern() {
    let router = router();
    let url = router
        .builder()
        .params(json!({ "slug": "hello-world" }))
        .disable_route_lookup()
        .make("/blog/:slug")
        .unwrap();
    assert_eq!(url, "/blog/hello-world");
}

#[test]
fn test_domain_scoped_builder() {
    let router = router();
    assert!(router.builder().make("tenant.settings").is_err());
    let url = router
        .builder_for_domain(":tenant.example.com")
        .make("tenant.settings")
        .unwrap();
    assert_eq!(url, "/settings");
}

#[test]
fn test_reuses_captured_params() {
    let router = router();
    let found = router
        .route(&http::Method::GET, "/users/5/posts/intro", None)
        .unwrap();
    let url = router
        .builder()
        .params_from(&found.params)
        .make("users.posts")
        .unwrap();
    assert_eq!(url, "/users/5/posts/intro");
}

#[test]
fn test_make_signed_appends_signature() {
    let router = router();
    let options = SignOptions {
        expires_in: Some(Duration::from_secs(60)),
        purpose: None,
    };
    let url = router
        .builder()
        .params(json!({ "id": 1 }))
        .prefix_url("https://example.com")
        .make_signed("users.show", &ReverseSigner, &options)
        .unwrap();
    assert_eq!(url, "https://example.com/users/1?signature=1%2Fsresu%2F%7E60");
}

#[test]
fn test_make_signed_reports_signer_failure() {
    let router = router();
    let err = router
        .builder()
        .params(json!({ "id": 1 }))
        .make_signed("users.show", &FailingSigner, &SignOptions::default())
        .unwrap_err();
    assert!(matches!(err, LookupError::Signing { ref identifier, .. } if identifier == "users.show"));
}

#[test]
fn test_matcher_reverse_cast_renders_segment() {
    let flag = Matcher::new(r"^(yes|no)$")
        .unwrap()
        .with_cast(|raw| json!(raw == "yes"))
        .with_reverse_cast(|value| match value.as_bool() {
            Some(true) => "yes".to_string(),
            _ => "no".to_string(),
        });

    let mut router = Router::new();
    router
        .add(
            Route::get("/filters/:archived", noop())
                .name("filters")
                .matcher("archived", flag),
        )
        .unwrap();

    let url = router
        .builder()
        .params(json!({ "archived": true }))
        .make("filters")
        .unwrap();
    assert_eq!(url, "/filters/yes");

    let matched = router.route(&http::Method::GET, &url, None).unwrap();
    assert_eq!(matched.param("archived"), Some(&json!(true)));
}

#[test]
fn test_matcher_without_reverse_cast_uses_identity() {
    let mut router = Router::new();
    router
        .add(
            Route::get("/posts/:id", noop())
                .name("posts.show")
                .matcher("id", Matcher::number()),
        )
        .unwrap();
    let url = router
        .builder()
        .params(json!({ "id": 42 }))
        .make("posts.show")
        .unwrap();
    assert_eq!(url, "/posts/42");
}
