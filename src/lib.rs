//! # Switchyard
//!
//! **Switchyard** is the routing and dispatch core of a coroutine-powered HTTP
//! service: a route table, a reverse lookup index with a URL builder, and a
//! short-circuitable pipeline of hooks and onion middleware around each
//! handler.
//!
//! ## Overview
//!
//! Routes are registered on a [`Router`] during startup. The router is then
//! moved into a [`PipelineBuilder`] together with before/after hooks, global
//! middleware and an error handler, and frozen into an immutable [`Pipeline`]
//! before traffic starts. The [`server`] module runs that pipeline on
//! `may_minihttp`, one coroutine per connection.
//!
//! ## Architecture
//!
//! - **[`router`]** - pattern tokenizer, route table, lookup index, URL builder
//! - **[`dispatcher`]** - pipeline builder, frozen pipeline, error handling, finalize
//! - **[`middleware`]** - middleware trait and cursor, tracing and metrics middleware
//! - **[`handler`]** - function and controller-method handlers
//! - **[`context`]** - per-request context, request/response types, ambient storage
//! - **[`server`]** - `may_minihttp` adapter
//! - **[`runtime_config`]** - environment and YAML configuration
//! - **[`logging`]** - `tracing-subscriber` setup
//!
//! ### Request Handling Flow
//!
//! ```text
//! Client ─▶ HttpServer ─▶ DispatchService ─▶ Pipeline::handle
//!                                               │
//!            before hooks ─▶ Router::route ─▶ global mw ─▶ route mw ─▶ handler
//!                                               │
//!            after hooks ◀── error handler (at most once) ◀── any error
//!                                               │
//!                                           finalize ─▶ wire
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use http::Method;
//! use serde_json::json;
//! use switchyard::{HandlerRef, Matcher, PipelineBuilder, Request, Route, Router};
//!
//! let mut router = Router::new();
//! router.add(
//!     Route::get("/posts/:id", HandlerRef::function(|ctx| {
//!         Ok(Some(json!({ "id": ctx.param("id") }).into()))
//!     }))
//!     .name("posts.show")
//!     .matcher("id", Matcher::number()),
//! )?;
//!
//! let pipeline = PipelineBuilder::new(router).freeze();
//! let response = pipeline.dispatch(Request::new(Method::GET, "/posts/42"));
//! assert_eq!(response.json(), Some(json!({ "id": 42 })));
//!
//! let url = pipeline.router().builder().params(json!({ "id": 7 })).make("posts.show")?;
//! assert_eq!(url, "/posts/7");
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use context::{Body, ContextStorage, Request, RequestContext, Response};
pub use dispatcher::{FinalResponse, Pipeline, PipelineBuilder};
pub use error::{HttpError, LookupError, RouteError};
pub use handler::{Controller, ControllerRegistry, HandlerRef, HandlerResult};
pub use ids::RequestId;
pub use middleware::{from_fn, Middleware, Next};
pub use router::{Matcher, Route, RouteMatch, Router};
pub use runtime_config::RuntimeConfig;
