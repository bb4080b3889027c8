//! Error taxonomy for registration, URL reversal and request dispatch.
//!
//! Three families, split by when they can happen:
//!
//! - [`RouteError`] - build-time registration conflicts. These abort startup.
//! - [`LookupError`] - URL reversal failures. Always returned to the caller.
//! - [`HttpError`] - request-time failures. Funnelled into the pipeline's
//!   single error handler and rendered as a response.

use std::fmt;

use http::{Method, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

/// Registration-time failures raised while the route table is being built.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Another route already occupies the exact (domain, method, pattern) tuple.
    #[error("Duplicate route found. \"{method}: {pattern}\" route already exists on domain \"{domain}\"")]
    DuplicateRoute {
        domain: String,
        method: Method,
        pattern: String,
    },

    /// The same param name appears twice inside one pattern.
    #[error("The \"{param}\" param is part of the route \"{pattern}\" more than once")]
    DuplicateRouteParam { param: String, pattern: String },

    /// The route name is already taken on this domain.
    #[error("A route with name \"{name}\" already exists on domain \"{domain}\"")]
    DuplicateRouteName { name: String, domain: String },

    /// The pattern could not be tokenized.
    #[error("Invalid route pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A matcher regex failed to compile.
    #[error("Invalid matcher for param \"{param}\"")]
    InvalidMatcher {
        param: String,
        #[source]
        source: regex::Error,
    },

    /// A route was registered without any HTTP method.
    #[error("Route \"{pattern}\" must accept at least one HTTP method")]
    MissingMethods { pattern: String },
}

/// Failures while reversing a route into a URL.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No route on the domain has this name, pattern or handler identity.
    #[error("Cannot lookup route \"{identifier}\" on domain \"{domain}\"")]
    CannotLookupRoute { identifier: String, domain: String },

    /// A required param was not supplied.
    #[error("Cannot make URL for \"{pattern}\" route. \"{param}\" param is missing")]
    CannotMakeUrl { param: String, pattern: String },

    /// The identifier was used as a raw pattern and could not be tokenized.
    #[error(transparent)]
    InvalidPattern(#[from] RouteError),

    /// The signer refused to sign the URL.
    #[error("Cannot sign URL for \"{identifier}\"")]
    Signing {
        identifier: String,
        #[source]
        source: anyhow::Error,
    },
}

/// What went wrong while serving a request.
#[derive(Debug)]
pub enum HttpErrorKind {
    /// No route matched the method + path (+ domain).
    RouteNotFound { method: Method, path: String },
    /// Raised deliberately by a handler, middleware or hook with its own
    /// status and body.
    Exception,
    /// Anything else. Rendered as a generic 500.
    Internal,
}

/// A request-time failure carrying the status and body to render.
///
/// Handlers and middleware return `Result<_, HttpError>`; any `anyhow::Error`
/// converts into an internal error via `?`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: Value,
    kind: HttpErrorKind,
    source: Option<anyhow::Error>,
}

impl HttpError {
    /// An exception with an explicit status and JSON body.
    #[must_use]
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            kind: HttpErrorKind::Exception,
            source: None,
        }
    }

    /// An exception whose body is `{ "error": message }`.
    #[must_use]
    pub fn with_message(status: StatusCode, message: &str) -> Self {
        Self::new(status, json!({ "error": message }))
    }

    /// The typed not-found condition raised when route resolution fails.
    #[must_use]
    pub fn route_not_found(method: Method, path: &str) -> Self {
        let body = json!({
            "error": "Not Found",
            "method": method.as_str(),
            "path": path,
        });
        Self {
            status: StatusCode::NOT_FOUND,
            body,
            kind: HttpErrorKind::RouteNotFound {
                method,
                path: path.to_string(),
            },
            source: None,
        }
    }

    /// An unexpected failure. The source is kept for logging only.
    #[must_use]
    pub fn internal(source: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "error": "Internal Server Error" }),
            kind: HttpErrorKind::Internal,
            source: Some(source),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    #[must_use]
    pub fn kind(&self) -> &HttpErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn is_route_not_found(&self) -> bool {
        matches!(self.kind, HttpErrorKind::RouteNotFound { .. })
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            HttpErrorKind::RouteNotFound { method, path } => {
                write!(f, "Cannot {method}:{path}")
            }
            HttpErrorKind::Exception => write!(f, "HTTP exception ({})", self.status),
            HttpErrorKind::Internal => match &self.source {
                Some(source) => write!(f, "Internal error: {source}"),
                None => write!(f, "Internal error"),
            },
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        HttpError::internal(err)
    }
}

impl From<LookupError> for HttpError {
    fn from(err: LookupError) -> Self {
        HttpError::internal(err.into())
    }
}
