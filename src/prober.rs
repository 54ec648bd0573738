//! Active health checking of backends.
//!
//! Each backend gets its own periodic task that sends
//! `GET {scheme}://{address}/health` with a bounded timeout. A backend is
//! healthy only when a response arrives in time with status `200 OK`;
//! transport errors, timeouts, and any other status mark it unhealthy.
//! The outcome is written to the [`Registry`] after the call returns, so
//! the registry lock is never held while waiting on the network.
//!
//! There is no hysteresis or backoff: every interval re-probes every
//! backend and the latest outcome wins.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::config::model::{Config, Scheme};
use crate::registry::Registry;
use crate::server::HttpClient;

pub const HEALTH_PATH: &str = "/health";

const USER_AGENT: &str = "hashlb-health-check";

pub struct Prober {
    registry: Arc<Registry>,
    client: HttpClient,
    scheme: Scheme,
    timeout: Duration,
    interval: Duration,
}

impl Prober {
    #[must_use]
    pub fn new(registry: Arc<Registry>, client: HttpClient, config: &Config) -> Self {
        Self {
            registry,
            client,
            scheme: config.scheme(),
            timeout: config.timeout(),
            interval: config.health_interval(),
        }
    }

    /// Send one liveness request to `address`. Does not touch the registry.
    pub async fn check(&self, address: &str) -> bool {
        let uri = format!("{}://{address}{HEALTH_PATH}", self.scheme);

        let request = match Request::builder()
            .method(Method::GET)
            .uri(&uri)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %address, error = %e, "failed to build health check request");
                return false;
            }
        };

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status != StatusCode::OK {
                    tracing::debug!(backend = %address, status = %status, "health check failed: unexpected status");
                }
                status == StatusCode::OK
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %address, error = %e, "health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %address, timeout_secs = self.timeout.as_secs(), "health check failed: timeout");
                false
            }
        }
    }

    /// Probe the backend at `index` and record the outcome.
    pub async fn probe(&self, index: usize) -> bool {
        let Some(backend) = self.registry.backends().get(index) else {
            return false;
        };
        let address = backend.address();

        let healthy = self.check(address).await;

        if let Some(status) = self.registry.set_health(index, healthy) {
            tracing::info!(
                backend = %address,
                healthy = status.healthy,
                connections = status.connections,
                "health probe"
            );
        }
        healthy
    }

    /// Probe every backend once, concurrently, and wait for all results.
    pub async fn probe_all(self: &Arc<Self>) {
        let mut set = JoinSet::new();
        for index in 0..self.registry.len() {
            let prober = Arc::clone(self);
            set.spawn(async move { prober.probe(index).await });
        }
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "initial health probe panicked");
            }
        }
    }

    /// Start one periodic task per backend. The tasks exit once `shutdown`
    /// flips to `true` or its sender is dropped.
    pub fn spawn(self: &Arc<Self>, shutdown: &watch::Receiver<bool>) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for index in 0..self.registry.len() {
            let prober = Arc::clone(self);
            let shutdown = shutdown.clone();
            set.spawn(prober.watch_backend(index, shutdown));
        }
        tracing::info!(
            backends = self.registry.len(),
            interval_secs = self.interval.as_secs(),
            "health probers started"
        );
        set
    }

    async fn watch_backend(self: Arc<Self>, index: usize, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // Skip first immediate tick; probe_all covers startup

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            self.probe(index).await;
        }

        tracing::debug!(index, "health prober shutting down");
    }
}
