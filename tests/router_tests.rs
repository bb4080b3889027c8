//! Route table integration tests: registration, matching order, params,
//! matchers, domains and the lookup index.

use http::Method;
use serde_json::{json, Value};
use switchyard::router::{Route, Router};
use switchyard::{Matcher, RouteError};

mod common;
use common::handlers::noop;

fn router_with(routes: Vec<Route>) -> Router {
    let mut router = Router::new();
    for route in routes {
        router.add(route).unwrap();
    }
    router
}

fn matched_name(router: &Router, method: Method, path: &str) -> Option<String> {
    router
        .route(&method, path, None)
        .and_then(|m| m.route.name.clone())
}

#[test]
fn test_every_registered_route_matches_itself() {
    let router = router_with(vec![
        Route::get("/", noop()).name("root"),
        Route::get("/zoo/animals", noop()).name("animals.index"),
        Route::get("/zoo/animals/:id", noop()).name("animals.show"),
        Route::get("/zoo/animals/:id/toys/:toy_id", noop()).name("animals.toy"),
    ]);

    assert_eq!(matched_name(&router, Method::GET, "/").as_deref(), Some("root"));
    assert_eq!(
        matched_name(&router, Method::GET, "/zoo/animals").as_deref(),
        Some("animals.index")
    );

    let found = router
        .route(&Method::GET, "/zoo/animals/12/toys/ball", None)
        .unwrap();
    assert_eq!(found.route.name.as_deref(), Some("animals.toy"));
    assert_eq!(found.param("id"), Some(&json!("12")));
    assert_eq!(found.param("toy_id"), Some(&json!("ball")));
    assert_eq!(&*found.route_key, "GET-/zoo/animals/:id/toys/:toy_id");
}

#[test]
fn test_method_mismatch_is_no_match() {
    let router = router_with(vec![Route::post("/zoo/animals", noop())]);
    assert!(router.route(&Method::GET, "/zoo/animals", None).is_none());
    assert!(router.route(&Method::POST, "/zoo/animals", None).is_some());
}

#[test]
fn test_get_routes_also_answer_head() {
    let router = router_with(vec![Route::get("/health", noop()).name("health")]);
    let found = router.route(&Method::HEAD, "/health", None).unwrap();
    assert_eq!(&*found.route_key, "HEAD-/health");
}

#[test]
fn test_first_registered_route_wins() {
    let router = router_with(vec![
        Route::get("/posts/:id", noop()).name("posts.show"),
        Route::get("/posts/new", noop()).name("posts.new"),
    ]);
    assert_eq!(
        matched_name(&router, Method::GET, "/posts/new").as_deref(),
        Some("posts.show")
    );

    let reversed = router_with(vec![
        Route::get("/posts/new", noop()).name("posts.new"),
        Route::get("/posts/:id", noop()).name("posts.show"),
    ]);
    assert_eq!(
        matched_name(&reversed, Method::GET, "/posts/new").as_deref(),
        Some("posts.new")
    );
}

#[test]
fn test_optional_param() {
    let router = router_with(vec![Route::get("/posts/:id?", noop())]);

    let bare = router.route(&Method::GET, "/posts", None).unwrap();
    assert!(bare.params.is_empty());

    let with_id = router.route(&Method::GET, "/posts/1", None).unwrap();
    assert_eq!(with_id.param("id"), Some(&json!("1")));

    assert!(router.route(&Method::GET, "/posts/1/2", None).is_none());
}

#[test]
fn test_wildcard_captures_remainder() {
    let router = router_with(vec![Route::get("/files/*", noop())]);

    let found = router.route(&Method::GET, "/files/a/b/c", None).unwrap();
    assert_eq!(found.param("*"), Some(&json!("a/b/c")));

    let empty = router.route(&Method::GET, "/files", None).unwrap();
    assert_eq!(empty.param("*"), Some(&json!("")));
}

#[test]
fn test_number_matcher_rejects_and_casts() {
    let router = router_with(vec![
        Route::get("/posts/:id", noop()).matcher("id", Matcher::number())
    ]);
    assert!(router.route(&Method::GET, "/posts/abc", None).is_none());

    let found = router.route(&Method::GET, "/posts/42", None).unwrap();
    assert_eq!(found.param("id"), Some(&Value::from(42u64)));
}

#[test]
fn test_custom_regex_matcher() {
    let route = Route::get("/users/:handle", noop())
        .where_regex("handle", "^@[a-z]+$")
        .unwrap();
    let router = router_with(vec![route]);
    assert!(router.route(&Method::GET, "/users/@ada", None).is_some());
    assert!(router.route(&Method::GET, "/users/ada", None).is_none());
}

#[test]
fn test_invalid_matcher_regex_is_rejected() {
    let err = Route::get("/users/:handle", noop())
        .where_regex("handle", "([a-z")
        .err()
        .unwrap();
    assert!(matches!(err, RouteError::InvalidMatcher { ref param, .. } if param == "handle"));
}

#[test]
fn test_duplicate_route_is_rejected() {
    let mut router = Router::new();
    router.add(Route::get("/users/:id", noop())).unwrap();
    let err = router.add(Route::get("/users/:id", noop())).unwrap_err();
    assert!(matches!(err, RouteError::DuplicateRoute { .. }));
    assert_eq!(router.len(), 1);

    // same pattern on another method is fine
    router.add(Route::delete("/users/:id", noop())).unwrap();
    assert_eq!(router.len(), 2);
}

#[test]
fn test_duplicate_param_is_rejected() {
    let mut router = Router::new();
    let err = router
        .add(Route::get("/users/:id/posts/:id", noop()))
        .unwrap_err();
    assert!(matches!(err, RouteError::DuplicateRouteParam { ref param, .. } if param == "id"));
    assert!(router.is_empty());
}

#[test]
fn test_duplicate_name_is_rejected() {
    let mut router = Router::new();
    router.add(Route::get("/a", noop()).name("thing")).unwrap();
    let err = router.add(Route::get("/b", noop()).name("thing")).unwrap_err();
    assert!(matches!(err, RouteError::DuplicateRouteName { .. }));
    assert!(!router.has("/b"));

    // names are scoped per domain
    router
        .add(Route::get("/b", noop()).name("thing").domain("admin.example.com"))
        .unwrap();
}

#[test]
fn test_route_without_methods_is_rejected() {
    let mut router = Router::new();
    let err = router.add(Route::new(vec![], "/nothing", noop())).unwrap_err();
    assert!(matches!(err, RouteError::MissingMethods { .. }));
}

#[test]
fn test_pattern_is_normalized() {
    let router = router_with(vec![Route::get("users/:id/", noop()).name("users.show")]);
    let route = router.find("users.show").unwrap();
    assert_eq!(route.pattern, "/users/:id");
    assert!(router.route(&Method::GET, "/users/1/", None).is_some());
}

#[test]
fn test_param_names_recorded_in_meta() {
    let router = router_with(vec![Route::get("/a/:x/b/:y?", noop()).name("ab")]);
    let route = router.find("ab").unwrap();
    let names: Vec<&str> = route.meta.params.iter().map(|p| p.as_ref()).collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[test]
fn test_dynamic_domain_captures_subdomains() {
    let router = router_with(vec![
        Route::get("/dashboard", noop()).name("root.dashboard"),
        Route::get("/dashboard", noop())
            .name("tenant.dashboard")
            .domain(":tenant.example.com"),
    ]);
    assert!(router.uses_domains());

    let found = router
        .route(&Method::GET, "/dashboard", Some("acme.example.com:8080"))
        .unwrap();
    assert_eq!(found.route.name.as_deref(), Some("tenant.dashboard"));
    assert_eq!(&*found.route_key, ":tenant.example.com-GET-/dashboard");
    assert_eq!(
        found.subdomains.iter().find(|(k, _)| k.as_ref() == "tenant").map(|(_, v)| v),
        Some(&json!("acme"))
    );

    // unknown hosts fall back to the root domain
    let fallback = router
        .route(&Method::GET, "/dashboard", Some("localhost"))
        .unwrap();
    assert_eq!(fallback.route.name.as_deref(), Some("root.dashboard"));
    assert!(fallback.subdomains.is_empty());
}

#[test]
fn test_root_only_router_skips_domain_matching() {
    let router = router_with(vec![Route::get("/", noop())]);
    assert!(!router.uses_domains());
    assert!(router.match_domain("anything.example.com").is_none());
}

#[test]
fn test_find_by_name_pattern_and_missing() {
    let router = router_with(vec![Route::get("/users/:id", noop()).name("users.show")]);

    assert!(router.has("users.show"));
    assert!(router.has("/users/:id"));
    assert!(router.find("users.index").is_none());
    assert!(!router.has("users.index"));

    let err = router.find_or_fail("users.index").unwrap_err();
    assert!(matches!(
        err,
        switchyard::LookupError::CannotLookupRoute { ref identifier, .. } if identifier == "users.index"
    ));
}

#[test]
fn test_find_in_domain_scopes_the_lookup() {
    let router = router_with(vec![
        Route::get("/", noop()).name("home"),
        Route::get("/settings", noop())
            .name("tenant.settings")
            .domain(":tenant.example.com"),
    ]);

    assert!(!router.has("tenant.settings"));
    assert!(router.has_in_domain(":tenant.example.com", "tenant.settings"));
    assert!(router.has_in_domain(":tenant.example.com", "/settings"));
    assert!(!router.has_in_domain(":tenant.example.com", "home"));

    let found = router
        .find_in_domain(":tenant.example.com", "tenant.settings")
        .unwrap();
    assert_eq!(found.pattern, "/settings");

    let err = router
        .find_or_fail_in_domain("admin.example.com", "tenant.settings")
        .unwrap_err();
    assert!(matches!(
        err,
        switchyard::LookupError::CannotLookupRoute { ref domain, .. } if domain == "admin.example.com"
    ));
}

#[test]
fn test_to_json_groups_by_domain() {
    let router = router_with(vec![
        Route::get("/a", noop()).name("a"),
        Route::post("/b", noop()).domain("api.example.com"),
    ]);
    let dump = router.to_json();
    assert_eq!(dump["root"][0]["name"], json!("a"));
    assert_eq!(dump["root"][0]["pattern"], json!("/a"));
    assert_eq!(dump["api.example.com"][0]["pattern"], json!("/b"));
    assert_eq!(dump["api.example.com"][0]["methods"], json!(["POST"]));
}
