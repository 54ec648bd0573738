//! Core HTTP forwarding.
//!
//! [`forward_handler`] is the Axum fallback that receives every request.
//! [`forward`] does the work: it asks the [`Registry`](crate::registry::Registry)
//! to pick a healthy backend by path hash, rewrites the request toward
//! that backend, and streams the backend's response back.
//!
//! ```text
//! Received ─┬─ no healthy backend ────────────────▶ 503 (NoHealthyBackends)
//!           └─ Selected ─▶ Forwarding ─┬─ error ──▶ 503 (BackendUnreachable)
//!                                      └─ response ─▶ headers, status, body
//! ```
//!
//! Nothing is retried and no other backend is tried after a failure.

pub mod deadline;
pub mod headers;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderValue, Uri};
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use tokio::time::Instant;

use crate::config::model::Scheme;
use crate::error::BalancerError;
use crate::server::AppState;
use self::deadline::DeadlineBody;

/// Response header naming the backend that served a request, set when
/// tracing is enabled.
pub const TRACE_HEADER: &str = "lb-from";

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    match forward(&state, request, addr.ip()).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Proxy one request to the backend its path hashes to.
///
/// The call to the backend and the relay of its body share one deadline,
/// `settings.timeout` after the request arrives.
///
/// Errors are logged here; the caller only turns them into a status.
pub async fn forward(
    state: &AppState,
    request: Request,
    client_ip: IpAddr,
) -> Result<Response, BalancerError> {
    let deadline = Instant::now() + state.settings.timeout;
    let (parts, body) = request.into_parts();
    let method = parts.method;
    let path = parts.uri.path();
    let correlation_id = parts
        .headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let selection = match state.registry.route(path) {
        Ok(selection) => selection,
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                method = %method,
                path = %path,
                "no healthy backends"
            );
            return Err(e);
        }
    };
    let backend = selection.backend.address();
    let settings = state.settings;

    let uri = upstream_uri(settings.scheme, backend, &parts.uri).map_err(|e| {
        tracing::error!(
            correlation_id = %correlation_id,
            backend = %backend,
            error = %e,
            "failed to build upstream URI"
        );
        BalancerError::InvalidUpstreamUri {
            backend: backend.to_string(),
            source: Box::new(e),
        }
    })?;

    let mut upstream = Request::new(body);
    *upstream.method_mut() = method.clone();
    *upstream.uri_mut() = uri;
    *upstream.headers_mut() =
        headers::build_forwarded_headers(&parts.headers, client_ip, backend, &correlation_id);

    let result = tokio::time::timeout_at(deadline, state.http_client.request(upstream)).await;

    let response = match result {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(unreachable(backend, &correlation_id, Box::new(e))),
        Err(_) => {
            let msg = format!("request timed out after {:?}", settings.timeout);
            return Err(unreachable(backend, &correlation_id, msg.into()));
        }
    };

    let (mut resp_parts, resp_body) = response.into_parts();
    headers::strip_response_hop_by_hop(&mut resp_parts.headers);
    if settings.trace {
        if let Ok(val) = HeaderValue::from_str(backend) {
            resp_parts.headers.insert(TRACE_HEADER, val);
        }
    }

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        backend = %backend,
        status = resp_parts.status.as_u16(),
        connections = selection.connections,
        "fwd"
    );

    let body = relay_body(resp_body, backend, &correlation_id, deadline);
    Ok(Response::from_parts(resp_parts, body))
}

fn unreachable(
    backend: &str,
    correlation_id: &str,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> BalancerError {
    tracing::error!(
        correlation_id = %correlation_id,
        backend = %backend,
        error = %source,
        "failed to get response from backend"
    );
    BalancerError::BackendUnreachable {
        backend: backend.to_string(),
        source,
    }
}

/// Rebuild the request target as `{scheme}://{backend}{path}?{query}`.
pub fn upstream_uri(
    scheme: Scheme,
    backend: &str,
    original: &Uri,
) -> Result<Uri, axum::http::Error> {
    let path_and_query = original.path_and_query().map_or("/", PathAndQuery::as_str);

    Uri::builder()
        .scheme(scheme.as_str())
        .authority(backend)
        .path_and_query(path_and_query)
        .build()
}

/// Stream the backend body to the client until `deadline`. A failure
/// mid-stream is logged; the status line has already gone out, so the
/// client just sees a truncated body.
fn relay_body<B>(body: B, backend: &str, correlation_id: &str, deadline: Instant) -> Body
where
    B: hyper::body::Body<Data = axum::body::Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let backend = backend.to_string();
    let correlation_id = correlation_id.to_string();
    let body = DeadlineBody::new(body, deadline).map_err(move |source| {
        let err = BalancerError::ResponseStream {
            backend: backend.clone(),
            source,
        };
        tracing::warn!(
            correlation_id = %correlation_id,
            error = %err,
            "failed to write response"
        );
        err
    });
    Body::new(body)
}
