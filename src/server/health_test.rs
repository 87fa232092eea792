//! Tests for probe endpoints

use super::health::*;
use super::metrics::create_metrics;
use crate::controller::Phase;
use std::time::Duration;

/// Block until the health port accepts TCP connections (up to 2 s)
async fn ready_client(port: u16) -> reqwest::Client {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "health server on port {} never started listening",
            port
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    reqwest::Client::new()
}

fn spawn_server(port: u16, phase: PhaseTracker) -> tokio::task::JoinHandle<()> {
    let metrics = create_metrics().expect("metrics registry");
    tokio::spawn(async move {
        let _ = run_health_server(port, phase, metrics).await;
    })
}

async fn get(client: &reqwest::Client, port: u16, path: &str) -> reqwest::Response {
    client
        .get(format!("http://127.0.0.1:{}{}", port, path))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to probe server")
}

#[tokio::test]
async fn test_healthz_returns_200() {
    let port = 18180;
    let handle = spawn_server(port, PhaseTracker::new());
    let client = ready_client(port).await;

    let response = get(&client, port, "/healthz").await;

    assert_eq!(response.status(), 200, "Liveness probe should return 200");
    handle.abort();
}

#[tokio::test]
async fn test_readyz_returns_503_while_initializing() {
    let port = 18181;
    let handle = spawn_server(port, PhaseTracker::new());
    let client = ready_client(port).await;

    let response = get(&client, port, "/readyz").await;

    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.expect("body"), "initializing");
    handle.abort();
}

#[tokio::test]
async fn test_readyz_follows_phase() {
    let port = 18182;
    let phase = PhaseTracker::new();
    let handle = spawn_server(port, phase.clone());
    let client = ready_client(port).await;

    phase.set(Phase::Monitoring);
    let response = get(&client, port, "/readyz").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("body"), "monitoring");

    phase.set(Phase::Draining);
    let response = get(&client, port, "/readyz").await;
    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.expect("body"), "draining");

    handle.abort();
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text_format() {
    let port = 18183;
    let handle = spawn_server(port, PhaseTracker::new());
    let client = ready_client(port).await;

    let response = get(&client, port, "/metrics").await;

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("body");
    assert!(body.contains("drain_sidecar_phase"));
    handle.abort();
}

#[test]
fn test_phase_tracker_transitions() {
    let tracker = PhaseTracker::new();
    assert_eq!(tracker.get(), Phase::Initializing);
    assert!(!tracker.is_ready());

    tracker.set(Phase::Monitoring);
    assert!(tracker.is_ready());

    // Clones share state
    let cloned = tracker.clone();
    cloned.set(Phase::Terminating);
    assert_eq!(tracker.get(), Phase::Terminating);
    assert!(!tracker.is_ready());
}
