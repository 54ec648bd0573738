//! Integration tests for request forwarding against live mock backends.

mod common;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use hashlb::error::BalancerError;
use hashlb::proxy::{self, TRACE_HEADER};

use common::{
    closed_address, healthy_state, start_backends, start_balancer, SLOW_PREFIX, TRICKLE_CHUNKS,
    TRICKLE_GAP, TRICKLE_PREFIX,
};
use http_body_util::BodyExt;

const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const TIMEOUT: Duration = Duration::from_secs(3);

fn get(path: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn concurrent_forwards_spread_by_path_hash() {
    let backends = start_backends(3).await;
    let addresses: Vec<String> = backends.iter().map(common::MockBackend::address).collect();
    let state = healthy_state(&addresses, false, TIMEOUT);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..30 {
        let state = Arc::clone(&state);
        tasks.spawn(async move {
            let response = proxy::forward(&state, get(&format!("/{i}")), CLIENT)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    let counts: Vec<u64> = state
        .registry
        .statuses()
        .iter()
        .map(|(_, s)| s.connections)
        .collect();
    assert_eq!(counts, [11, 10, 9]);
    assert_eq!(counts.iter().sum::<u64>(), 30);

    for (backend, expected) in backends.iter().zip([11, 10, 9]) {
        assert_eq!(backend.hits(), expected, "hits on {}", backend.address());
    }
}

#[tokio::test]
async fn no_healthy_backend_is_service_unavailable() {
    let state = healthy_state(&["invalid:8080".to_string()], false, TIMEOUT);
    state.registry.set_health(0, false);

    let err = proxy::forward(&state, get("/anything"), CLIENT)
        .await
        .unwrap_err();

    assert!(matches!(err, BalancerError::NoHealthyBackends));
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(state.registry.status(0).unwrap().connections, 0);
}

#[tokio::test]
async fn unreachable_backend_is_service_unavailable_but_counted() {
    let address = closed_address().await;
    let state = healthy_state(&[address.clone()], false, TIMEOUT);

    let err = proxy::forward(&state, get("/"), CLIENT).await.unwrap_err();

    assert!(
        matches!(err, BalancerError::BackendUnreachable { ref backend, .. } if *backend == address)
    );
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(state.registry.status(0).unwrap().connections, 1);
}

#[tokio::test]
async fn slow_backend_times_out() {
    let backends = start_backends(1).await;
    let state = healthy_state(&[backends[0].address()], false, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = proxy::forward(&state, get(&format!("{SLOW_PREFIX}/report")), CLIENT)
        .await
        .unwrap_err();

    assert!(matches!(err, BalancerError::BackendUnreachable { .. }));
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn trickling_body_is_cut_at_the_request_deadline() {
    let backends = start_backends(1).await;
    let timeout = Duration::from_millis(500);
    let state = healthy_state(&[backends[0].address()], false, timeout);

    let started = std::time::Instant::now();
    let response = proxy::forward(&state, get(&format!("{TRICKLE_PREFIX}/feed")), CLIENT)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = response.into_body().collect().await;
    let elapsed = started.elapsed();

    assert!(result.is_err(), "body outlived the request deadline");
    assert!(elapsed < timeout + TRICKLE_GAP * 2, "cut off after {elapsed:?}");
    assert!(elapsed < TRICKLE_GAP * u32::try_from(TRICKLE_CHUNKS).unwrap());
}

#[tokio::test]
async fn trickling_body_within_deadline_is_delivered() {
    let backends = start_backends(1).await;
    let state = healthy_state(&[backends[0].address()], false, TIMEOUT);

    let response = proxy::forward(&state, get(&format!("{TRICKLE_PREFIX}/feed")), CLIENT)
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    assert_eq!(body.len(), TRICKLE_CHUNKS * 6);
}

#[tokio::test]
async fn trace_header_names_the_serving_backend() {
    let backends = start_backends(3).await;
    let addresses: Vec<String> = backends.iter().map(common::MockBackend::address).collect();
    let state = healthy_state(&addresses, true, TIMEOUT);
    let lb = start_balancer(Arc::clone(&state)).await;
    let client = common::client();

    for i in 0..100 {
        let resp = client
            .get(format!("http://{lb}/{i}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let from = resp
            .headers()
            .get(TRACE_HEADER)
            .expect("lb-from header")
            .to_str()
            .unwrap()
            .to_string();
        let body = resp.text().await.unwrap();
        let served_by = body.lines().next().unwrap();
        assert_eq!(from, served_by, "path /{i}");
    }

    for (backend, expected) in backends.iter().zip([37, 31, 32]) {
        assert_eq!(backend.hits(), expected, "hits on {}", backend.address());
    }
    let counts: Vec<u64> = state
        .registry
        .statuses()
        .iter()
        .map(|(_, s)| s.connections)
        .collect();
    assert_eq!(counts, [37, 31, 32]);
}

#[tokio::test]
async fn trace_header_absent_when_disabled() {
    let backends = start_backends(2).await;
    let addresses: Vec<String> = backends.iter().map(common::MockBackend::address).collect();
    let lb = start_balancer(healthy_state(&addresses, false, TIMEOUT)).await;

    let resp = common::client()
        .get(format!("http://{lb}/api/items"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get(TRACE_HEADER).is_none());
    assert_eq!(resp.headers().get("x-backend-note").unwrap(), "from-mock");
}

#[tokio::test]
async fn request_is_relayed_with_rewritten_host() {
    let backends = start_backends(1).await;
    let address = backends[0].address();
    let lb = start_balancer(healthy_state(&[address.clone()], false, TIMEOUT)).await;

    let resp = common::client()
        .post(format!("http://{lb}/orders?page=2&sort=desc"))
        .header("x-forwarded-for", "203.0.113.7")
        .body("order payload")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let headers = resp.headers();
    assert_eq!(headers.get("x-echo-method").unwrap(), "POST");
    assert_eq!(headers.get("x-echo-uri").unwrap(), "/orders?page=2&sort=desc");
    assert_eq!(headers.get("x-echo-host").unwrap(), address.as_str());
    assert_eq!(
        headers.get("x-echo-forwarded-for").unwrap(),
        "203.0.113.7, 127.0.0.1"
    );

    let body = resp.text().await.unwrap();
    assert_eq!(body, format!("{address}\norder payload"));
}

#[tokio::test]
async fn balancer_answers_503_when_pool_is_down() {
    let backends = start_backends(2).await;
    let addresses: Vec<String> = backends.iter().map(common::MockBackend::address).collect();
    let state = healthy_state(&addresses, true, TIMEOUT);
    state.registry.set_health(0, false);
    state.registry.set_health(1, false);
    let lb = start_balancer(state).await;

    let resp = common::client()
        .get(format!("http://{lb}/"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    assert!(resp.headers().get(TRACE_HEADER).is_none());
    assert_eq!(backends[0].hits() + backends[1].hits(), 0);
}
