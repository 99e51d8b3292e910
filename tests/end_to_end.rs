//! End-to-end: client → GuardServer → mock upstream over real sockets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use circuit_guard::config::GuardConfig;
use circuit_guard::{GuardServer, Shutdown};

mod common;

async fn start_guard(config: GuardConfig) -> (String, Shutdown) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = GuardServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (format!("http://{}", addr), shutdown)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_failing_upstream_trips_and_recovers() {
    let calls = Arc::new(AtomicU32::new(0));
    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let (cc, hh) = (calls.clone(), healthy.clone());
    let backend = common::start_programmable_backend(move || {
        let (cc, hh) = (cc.clone(), hh.clone());
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            if hh.load(Ordering::SeqCst) {
                (200, "ok".into())
            } else {
                (500, "boom".into())
            }
        }
    })
    .await;

    let mut config = GuardConfig::default();
    config.upstream.address = backend.to_string();
    config.breaker.window_size = 2;
    config.breaker.cooldown_schedule_ms = vec![300];
    let (base, shutdown) = start_guard(config).await;
    let client = client();

    for _ in 0..2 {
        let res = client.get(format!("{}/items", base)).send().await.unwrap();
        assert_eq!(res.status(), 500);
    }

    let res = client.get(format!("{}/items", base)).send().await.unwrap();
    assert_eq!(res.status(), 403);
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(calls.load(Ordering::SeqCst), 2, "rejected request must not reach upstream");

    // Other targets are unaffected.
    let res = client.get(format!("{}/other", base)).send().await.unwrap();
    assert_eq!(res.status(), 500);

    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let res = client.get(format!("{}/items", base)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");

    let res = client.get(format!("{}/items", base)).send().await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_a_failure() {
    // Bind then drop to get a port with nothing listening.
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let mut config = GuardConfig::default();
    config.upstream.address = dead.to_string();
    config.breaker.window_size = 1;
    config.breaker.cooldown_schedule_ms = vec![60_000];
    let (base, shutdown) = start_guard(config).await;
    let client = client();

    let res = client.get(format!("{}/x", base)).send().await.unwrap();
    assert_eq!(res.status(), 502);

    let res = client.get(format!("{}/x", base)).send().await.unwrap();
    assert_eq!(res.status(), 403);
    assert_eq!(res.headers()["retry-after"], "60");

    shutdown.trigger();
}
