use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::dispatcher::FinalResponse;

/// Upper bound on distinct header lines kept in the reuse cache.
pub const MAX_INTERNED_HEADER_LINES: usize = 4096;

/// `may_minihttp` only accepts `'static` header lines. Each distinct
/// `Name: value` line is leaked once and reused afterwards. Past the cap,
/// lines are still leaked and written but no longer cached.
static HEADER_LINES: Lazy<DashMap<String, &'static str>> = Lazy::new(DashMap::new);
static UNCACHED_LINES: AtomicUsize = AtomicUsize::new(0);
static CAP_WARNED: AtomicBool = AtomicBool::new(false);

/// Header lines leaked outside the cache since startup.
#[must_use]
pub fn uncached_header_lines() -> usize {
    UNCACHED_LINES.load(Ordering::Relaxed)
}

fn header_line(name: &str, value: &str) -> &'static str {
    let line = format!("{}: {}", canonical_name(name), value);
    if let Some(found) = HEADER_LINES.get(&line) {
        return *found;
    }
    if HEADER_LINES.len() >= MAX_INTERNED_HEADER_LINES {
        UNCACHED_LINES.fetch_add(1, Ordering::Relaxed);
        if !CAP_WARNED.swap(true, Ordering::Relaxed) {
            warn!(
                cap = MAX_INTERNED_HEADER_LINES,
                header = %name,
                "Header line cache full; leaking further distinct header lines uncached"
            );
        }
        return Box::leak(line.into_boxed_str());
    }
    let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
    *HEADER_LINES.entry(line).or_insert(leaked)
}

/// `content-type` → `Content-Type`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Write a finalized response onto the connection.
pub fn write_response(res: &mut Response, response: FinalResponse) {
    let status = response.status;
    res.status_code(
        status.as_u16() as usize,
        status.canonical_reason().unwrap_or("Unknown"),
    );

    if let Some(content_type) = response.content_type {
        res.header(header_line("content-type", content_type));
    }
    for (name, value) in &response.headers {
        // the server writes its own length and framing
        if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("transfer-encoding") {
            continue;
        }
        res.header(header_line(name, value));
    }
    res.body_vec(response.body);
}
