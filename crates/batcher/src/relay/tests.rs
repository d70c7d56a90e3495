use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::*;
use crate::testing::{RecordingSender, data, dummy_config};

async fn bound() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn body(namespace: &str, n: usize) -> String {
    MetricRequest::new(namespace, data(n)).to_json()
}

#[tokio::test]
async fn posted_metrics_are_flushed_on_shutdown() {
    let (listener, port) = bound().await;
    let config = dummy_config(port);
    let mut relay = Relay::with_listener(RecordingSender::default(), &config, listener);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let client = tokio::spawn(async move {
        let client = reqwest::Client::new();
        for (namespace, n) in [("a", 25), ("b", 3)] {
            let resp = client
                .post(format!("http://127.0.0.1:{port}/v1/metrics"))
                .body(body(namespace, n))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }
        stop_tx.send(()).unwrap();
    });

    relay
        .run(async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();
    client.await.unwrap();

    let sender = relay.batcher().sender();
    assert_eq!(sender.sizes(), vec![20, 5, 3]);
    assert_eq!(sender.concatenated("a"), data(25));
    assert_eq!(sender.concatenated("b"), data(3));
}

#[tokio::test]
async fn posts_after_shutdown_are_not_acknowledged() {
    let (listener, port) = bound().await;
    let config = dummy_config(port);
    let mut relay = Relay::with_listener(RecordingSender::default(), &config, listener);
    let url = format!("http://127.0.0.1:{port}/v1/metrics");
    let client = reqwest::Client::new();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let first = tokio::spawn({
        let client = client.clone();
        let url = url.clone();
        async move {
            let resp = client.post(url).body(body("a", 1)).send().await.unwrap();
            assert_eq!(resp.status(), 200);
            stop_tx.send(()).unwrap();
        }
    });

    relay
        .run(async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();
    first.await.unwrap();

    // Same client, so the kept-alive connection is reused when still open.
    // A refused or reset connection is also a refusal.
    if let Ok(resp) = client.post(url).body(body("late", 5)).send().await {
        assert_eq!(resp.status(), 502);
    }

    assert_eq!(
        relay.batcher().sender().sent(),
        vec![("a".to_owned(), data(1))]
    );
    assert_eq!(relay.batcher().pending("late"), 0);
}

#[tokio::test]
async fn auto_flush_runs_while_relay_is_up() {
    let (listener, port) = bound().await;
    let mut config = dummy_config(port);
    config.flush_interval = Duration::from_millis(50);
    let mut relay = Relay::with_listener(RecordingSender::default(), &config, listener);
    let batcher = relay.batcher().clone();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let client = tokio::spawn(async move {
        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/v1/metrics"))
            .body(body("svc", 4))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let sent = batcher.sender().sent();
        stop_tx.send(()).unwrap();
        sent
    });

    relay
        .run(async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();

    let sent = client.await.unwrap();
    assert_eq!(sent, vec![("svc".to_owned(), data(4))]);
}

#[tokio::test]
async fn listener_crash_returns_error() {
    let (listener, port) = bound().await;
    let config = dummy_config(port);
    let mut relay = Relay::with_listener(RecordingSender::default(), &config, listener);

    // Simulates a panic in the listener task.
    relay.listener_task.abort();

    let err = relay.run(std::future::pending()).await.unwrap_err();
    assert!(matches!(err, RelayError::ListenerDied), "error: {err}");
}

#[tokio::test]
async fn new_fails_when_port_is_taken() {
    let (_held, port) = bound().await;
    let config = dummy_config(port);
    let err = Relay::new(RecordingSender::default(), &config)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RelayError::Bind(_)));
}
