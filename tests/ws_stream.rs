use framesightd::server;
use framesightd::state::StatsStore;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(store: Arc<StatsStore>, interval: Duration) -> (String, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::build_router(store, interval, shutdown_rx);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}/"), shutdown_tx)
}

async fn next_json(client: &mut Client) -> Value {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            let msg = client.next().await.expect("stream open").expect("read ok");
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).expect("snapshot JSON");
            }
        }
    })
    .await
    .expect("snapshot within deadline")
}

async fn wait_for<F>(client: &mut Client, predicate: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    for _ in 0..100 {
        let value = next_json(client).await;
        if predicate(&value) {
            return value;
        }
    }
    panic!("condition not reached within 100 snapshots");
}

#[tokio::test]
async fn streams_snapshots_and_applies_benchmark_commands() {
    let store = Arc::new(StatsStore::new());
    let (url, _shutdown) = start_server(store.clone(), Duration::from_millis(50)).await;

    let (mut client, _) = connect_async(&url).await.unwrap();

    let first = next_json(&mut client).await;
    assert!(first.get("cpu").is_some());
    assert!(first.get("disks").is_some());
    assert_eq!(first["benchmarking"]["is_running"], false);

    client
        .send(Message::Text("app,Game.exe".into()))
        .await
        .unwrap();
    for _ in 0..100 {
        if store.benchmark_target().await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.benchmark_target().await, Some("Game.exe".to_string()));

    // Feed one frame the way the capture task would.
    store.record_frame("Game.exe", 16.6).await;

    let running = wait_for(&mut client, |v| v["benchmarking"]["fps"] == 60.24).await;
    assert_eq!(running["benchmarking"]["is_running"], true);
    assert_eq!(running["benchmarking"]["frametime"], 16.6);

    // A command without an app name disarms but leaves the metrics frozen.
    client.send(Message::Text("stop".into())).await.unwrap();
    let stopped = wait_for(&mut client, |v| v["benchmarking"]["is_running"] == false).await;
    assert_eq!(stopped["benchmarking"]["fps"], 60.24);
}

#[tokio::test]
async fn dropped_connection_leaves_others_streaming() {
    let store = Arc::new(StatsStore::new());
    let (url, _shutdown) = start_server(store, Duration::from_millis(30)).await;

    let (mut kept, _) = connect_async(&url).await.unwrap();
    let (mut dropped, _) = connect_async(&url).await.unwrap();

    let _ = next_json(&mut kept).await;
    let _ = next_json(&mut dropped).await;
    drop(dropped);

    for _ in 0..5 {
        let snapshot = next_json(&mut kept).await;
        assert!(snapshot.get("benchmarking").is_some());
    }
}

#[tokio::test]
async fn shutdown_signal_ends_open_streams() {
    let store = Arc::new(StatsStore::new());
    let (url, shutdown) = start_server(store, Duration::from_millis(30)).await;

    let (mut client, _) = connect_async(&url).await.unwrap();
    let _ = next_json(&mut client).await;

    shutdown.send(true).unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                None => break,
                Some(Err(_)) => break,
                Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "stream should end after shutdown");
}
