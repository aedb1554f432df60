use crate::state::StatsStore;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<StatsStore>,
    pub publish_interval: Duration,
    pub shutdown: watch::Receiver<bool>,
}

pub fn build_router(
    store: Arc<StatsStore>,
    publish_interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .with_state(ServerState {
            store,
            publish_interval,
            shutdown,
        })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_stats(socket, state))
}

/// Publisher/command loop for one connection: send the current snapshot,
/// then wait up to one publish interval for a client command. Send/receive
/// failures end this connection only; the listener keeps accepting.
async fn stream_stats(mut socket: WebSocket, state: ServerState) {
    let ServerState {
        store,
        publish_interval,
        mut shutdown,
    } = state;
    info!("client connected");

    loop {
        let snapshot = store.snapshot().await;
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "failed to encode snapshot");
                break;
            }
        };
        if let Err(err) = socket.send(Message::Text(payload)).await {
            debug!(error = %err, "send failed, closing stream");
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            received = time::timeout(publish_interval, socket.recv()) => match received {
                // No command this cycle.
                Err(_elapsed) => {}
                Ok(None) => break,
                Ok(Some(Ok(Message::Text(text)))) => {
                    let target = parse_command(&text);
                    debug!(command = %text, target = ?target, "client command");
                    store.set_benchmark_target(target).await;
                }
                Ok(Some(Ok(Message::Close(_)))) => break,
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(err))) => {
                    debug!(error = %err, "receive failed, closing stream");
                    break;
                }
            }
        }
    }

    info!("client disconnected");
}

/// Command protocol: a message containing the keyword "app" followed by a
/// comma-separated application name arms benchmarking for that name; any
/// other command, or an empty app field, disarms it.
pub fn parse_command(text: &str) -> Option<String> {
    if !text.contains("app") {
        return None;
    }
    let name = text.splitn(2, ',').nth(1).map(str::trim).unwrap_or("");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn app_command_extracts_target() {
        assert_eq!(parse_command("app,Game.exe"), Some("Game.exe".to_string()));
        assert_eq!(parse_command("app, Game.exe "), Some("Game.exe".to_string()));
    }

    #[test]
    fn commands_without_app_name_disarm() {
        assert_eq!(parse_command("app,"), None);
        assert_eq!(parse_command("app"), None);
        assert_eq!(parse_command("stop"), None);
        assert_eq!(parse_command(""), None);
    }

    #[tokio::test]
    async fn plain_get_is_rejected_without_upgrade() {
        let (_tx, rx) = watch::channel(false);
        let app = build_router(Arc::new(StatsStore::new()), Duration::from_secs(1), rx);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
