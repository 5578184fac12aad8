//! Connection drain behaviour against a live listener.

use std::time::{Duration, Instant};

use axum::{middleware, routing::get, Router};

use insights_backend::config::ListenerConfig;
use insights_backend::lifecycle::{PhaseOutcome, ShutdownCoordinator};
use insights_backend::net::connection::{track_inflight, InflightTracker};
use insights_backend::net::{drain, listener};

mod common;

async fn start(
    delay: Duration,
    coordinator: &ShutdownCoordinator,
) -> (drain::DrainHandle, InflightTracker) {
    let tracker = InflightTracker::new();
    let router = Router::new()
        .route(
            "/slow",
            get(move || async move {
                tokio::time::sleep(delay).await;
                "done"
            }),
        )
        .layer(middleware::from_fn_with_state(tracker.clone(), track_inflight));

    let config = ListenerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..ListenerConfig::default()
    };
    let listener = listener::bind(&config).await.unwrap();
    let handle = drain::spawn(listener, router, tracker.clone(), coordinator.subscribe()).unwrap();
    (handle, tracker)
}

#[tokio::test]
async fn in_flight_request_completes_during_drain() {
    let coordinator = ShutdownCoordinator::new();
    let (server, tracker) = start(Duration::from_millis(300), &coordinator).await;
    let url = format!("http://{}/slow", server.local_addr());

    let request = tokio::spawn(async move { reqwest::get(url).await.unwrap().text().await.unwrap() });
    assert!(common::wait_until(Duration::from_secs(1), || tracker.active_count() == 1).await);

    coordinator.trigger();
    let report = server.drain(Duration::from_secs(2)).await;

    assert_eq!(report.outcome, PhaseOutcome::Completed);
    assert_eq!(report.completed, 1);
    assert_eq!(request.await.unwrap(), "done");
}

#[tokio::test]
async fn drain_deadline_abandons_slow_requests() {
    let coordinator = ShutdownCoordinator::new();
    let (server, tracker) = start(Duration::from_secs(30), &coordinator).await;
    let url = format!("http://{}/slow", server.local_addr());

    let _request = tokio::spawn(async move { reqwest::get(url).await });
    assert!(common::wait_until(Duration::from_secs(1), || tracker.active_count() == 1).await);

    coordinator.trigger();
    let started = Instant::now();
    let report = server.drain(Duration::from_millis(300)).await;

    assert_eq!(report.outcome, PhaseOutcome::TimedOut);
    assert_eq!(report.abandoned, 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn listener_closed_after_drain() {
    let coordinator = ShutdownCoordinator::new();
    let (server, _) = start(Duration::from_millis(10), &coordinator).await;
    let addr = server.local_addr();

    coordinator.trigger();
    let report = server.drain(Duration::from_secs(1)).await;
    assert_eq!(report.outcome, PhaseOutcome::Completed);
    assert_eq!(report.completed, 0);

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
