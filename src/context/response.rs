use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Value};

use super::request::HeaderVec;

/// Response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    /// Default `Content-Type` for the body kind.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Json(_) => "application/json",
            Body::Text(_) => "text/plain; charset=utf-8",
            Body::Bytes(_) => "application/octet-stream",
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Body::Json(value) => serde_json::to_vec(&value),
            Body::Text(text) => Ok(text.into_bytes()),
            Body::Bytes(bytes) => Ok(bytes),
        }
    }
}

/// A bare JSON string is sent as text; every other value as JSON.
impl From<Value> for Body {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Body::Text(text),
            other => Body::Json(other),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

/// Outgoing response under construction.
///
/// A response is *pending* until [`Response::end`] is called or the pipeline
/// finalizes it. Hooks that set a body or end the response stop the rest of
/// the before stage.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderVec,
    body: Option<Body>,
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderVec::new(),
            body: None,
            finished: false,
        }
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

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

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(k, _)| k.as_ref() != name);
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    /// Add a header, keeping previous values (e.g. `set-cookie`).
    pub fn append_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    /// Drop every value of a header.
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self
    }

    /// Set the body. Replaces any body written earlier.
    pub fn send(&mut self, body: impl Into<Body>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body, whatever the value's shape.
    pub fn json(&mut self, value: Value) -> &mut Self {
        self.body = Some(Body::Json(value));
        self
    }

    /// `Location` header plus a 302, and end the response.
    pub fn redirect(&mut self, location: &str) -> &mut Self {
        self.set_status(StatusCode::FOUND);
        self.set_header("location", location);
        self.end();
        self
    }

    /// Mark the response as no longer pending.
    pub fn end(&mut self) -> &mut Self {
        self.finished = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.finished
    }

    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Overwrite with the generic 500 used when error handling itself fails.
    /// Headers set by earlier stages are discarded.
    pub(crate) fn internal_error(&mut self) {
        self.status = StatusCode::INTERNAL_SERVER_ERROR;
        self.headers.clear();
        self.body = Some(Body::Json(json!({ "error": "Internal Server Error" })));
    }
}
