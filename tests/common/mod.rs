//! Shared helpers for integration tests: axum mock backends and a
//! balancer served on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper::body::Frame;
use tokio::sync::mpsc;
use axum::routing::get;
use axum::Router;

use hashlb::registry::Registry;
use hashlb::server::{self, AppState, ProxySettings};
use hashlb::config::model::Scheme;

/// Paths starting with this prefix make the mock sleep before replying.
pub const SLOW_PREFIX: &str = "/slow";

/// Paths starting with this prefix get a body of [`TRICKLE_CHUNKS`]
/// six-byte chunks, one every [`TRICKLE_GAP`].
pub const TRICKLE_PREFIX: &str = "/trickle";
pub const TRICKLE_CHUNKS: usize = 12;
pub const TRICKLE_GAP: Duration = Duration::from_millis(200);

struct MockState {
    address: String,
    hits: AtomicUsize,
    health_status: AtomicU16,
    health_delay_ms: AtomicU64,
}

/// A backend bound to `127.0.0.1:0`.
///
/// `GET /health` answers with a configurable status after a configurable
/// delay. Every other request is counted and answered with `200`, the
/// backend address on the first line of the body, the request body on
/// the rest, and `x-echo-*` headers describing what arrived.
pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(MockState {
            address: addr.to_string(),
            hits: AtomicUsize::new(0),
            health_status: AtomicU16::new(200),
            health_delay_ms: AtomicU64::new(0),
        });

        let router = Router::new()
            .route("/health", get(health))
            .fallback(echo)
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn set_health_status(&self, status: u16) {
        self.state.health_status.store(status, Ordering::SeqCst);
    }

    pub fn set_health_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap();
        self.state.health_delay_ms.store(millis, Ordering::SeqCst);
    }
}

async fn health(State(state): State<Arc<MockState>>) -> StatusCode {
    let delay = state.health_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    StatusCode::from_u16(state.health_status.load(Ordering::SeqCst)).unwrap()
}

async fn echo(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    if uri.path().starts_with(TRICKLE_PREFIX) {
        return Body::new(trickle()).into_response();
    }

    if uri.path().starts_with(SLOW_PREFIX) {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    (
        [
            ("x-echo-method", method.to_string()),
            ("x-echo-uri", uri.to_string()),
            ("x-echo-host", host),
            ("x-echo-forwarded-for", forwarded_for),
            ("x-backend-note", "from-mock".to_string()),
        ],
        format!("{}\n{}", state.address, String::from_utf8_lossy(&body)),
    )
        .into_response()
}

/// Body fed by a task that sends one chunk per [`TRICKLE_GAP`].
struct ChannelBody(mpsc::Receiver<Bytes>);

impl hyper::body::Body for ChannelBody {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        self.get_mut()
            .0
            .poll_recv(cx)
            .map(|chunk| chunk.map(|data| Ok(Frame::data(data))))
    }
}

fn trickle() -> ChannelBody {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        for i in 0..TRICKLE_CHUNKS {
            tokio::time::sleep(TRICKLE_GAP).await;
            if tx.send(Bytes::from(format!("chunk{:x}", i % 16))).await.is_err() {
                return;
            }
        }
    });
    ChannelBody(rx)
}

/// Start `n` mock backends.
pub async fn start_backends(n: usize) -> Vec<MockBackend> {
    let mut backends = Vec::with_capacity(n);
    for _ in 0..n {
        backends.push(MockBackend::start().await);
    }
    backends
}

/// Address of a port that nothing listens on.
pub async fn closed_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// Shared state over a registry of `addresses`, all marked healthy.
pub fn healthy_state(addresses: &[String], trace: bool, timeout: Duration) -> Arc<AppState> {
    let registry = Registry::new(addresses.iter().cloned());
    for i in 0..registry.len() {
        registry.set_health(i, true);
    }
    Arc::new(AppState {
        registry: Arc::new(registry),
        http_client: server::build_http_client(),
        settings: ProxySettings {
            scheme: Scheme::Http,
            timeout,
            trace,
        },
    })
}

/// Serve the balancer router on `127.0.0.1:0`.
pub async fn start_balancer(state: Arc<AppState>) -> SocketAddr {
    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
