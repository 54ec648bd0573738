//! Header rewriting for forwarded requests and relayed responses.
//!
//! [`build_forwarded_headers`] clones the client's headers, strips
//! hop-by-hop headers, rewrites `Host` to the chosen backend, and adds
//! proxy metadata (`X-Forwarded-For`, `X-Forwarded-Proto`,
//! `X-Forwarded-Host`, `X-Correlation-Id`).
//! [`strip_response_hop_by_hop`] cleans a backend response before it is
//! relayed.

use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Strip hop-by-hop headers from a backend response. `content-length` is
/// kept because the body is streamed through unchanged.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: IpAddr,
    backend: &str,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = original.clone();

    for header_name in HOP_BY_HOP.iter() {
        headers.remove(header_name);
    }

    if let Ok(val) = HeaderValue::from_str(backend) {
        headers.insert("host", val);
    }

    // X-Forwarded-For: append to chain
    let client_ip = client_ip.to_string();
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.clone(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    // The listener speaks plain HTTP.
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));

    if let Some(original_host) = original.get("host") {
        headers.insert("x-forwarded-host", original_host.clone());
    }

    if let Ok(val) = HeaderValue::from_str(correlation_id) {
        headers.insert("x-correlation-id", val);
    }

    headers
}
