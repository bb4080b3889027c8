use std::io::Read;

use http::method::InvalidMethod;
use http::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::context::Request;

/// Convert a `may_minihttp::Request` into a pipeline [`Request`].
///
/// The body is kept as JSON when it parses, as a string when it is other
/// UTF-8 text, and dropped otherwise.
pub fn parse_request(req: may_minihttp::Request) -> Result<Request, InvalidMethod> {
    let method = req.method().to_string();
    let target = req.path().to_string();
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    let mut raw_body = Vec::new();
    if let Err(err) = req.body().read_to_end(&mut raw_body) {
        debug!(error = %err, "Request body could not be read");
        raw_body.clear();
    }

    build_request(
        &method,
        &target,
        headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        &raw_body,
    )
}

/// Assemble a [`Request`] from already extracted parts.
pub fn build_request<'a, I>(
    method: &str,
    target: &str,
    headers: I,
    raw_body: &[u8],
) -> Result<Request, InvalidMethod>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let method = Method::from_bytes(method.as_bytes())?;
    let mut request = Request::new(method, target);
    for (name, value) in headers {
        request.push_header(name, value);
    }

    if let Some(body) = decode_body(raw_body) {
        debug!(
            body_size_bytes = raw_body.len(),
            json = !body.is_string(),
            "Request body read"
        );
        request = request.with_body(body);
    }

    info!(
        method = %request.method(),
        path = %request.path(),
        headers_count = request.headers().len(),
        "HTTP request parsed"
    );
    Ok(request)
}

fn decode_body(raw: &[u8]) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_slice::<Value>(raw) {
        return Some(json);
    }
    std::str::from_utf8(raw)
        .ok()
        .map(|text| Value::String(text.to_string()))
}
