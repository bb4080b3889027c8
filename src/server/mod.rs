//! HTTP server adapter on top of `may_minihttp`.
//!
//! Parses raw requests into [`Request`](crate::context::Request)s, runs them
//! through the current pipeline and writes the finalized response.

mod http_server;
mod request;
mod response;
mod service;

pub use self::http_server::{apply_runtime_config, HttpServer, ServerHandle};
pub use self::request::{build_request, parse_request};
pub use self::response::{uncached_header_lines, write_response, MAX_INTERNED_HEADER_LINES};
pub use self::service::DispatchService;
