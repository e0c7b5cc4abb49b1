use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::broadcaster::Broadcaster;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `"ok"` while the relay serves requests.
    pub status: &'static str,
    /// Connected live subscribers.
    pub subscribers: usize,
}

/// Routes of the relay: the `/live` websocket and `/health`.
pub fn router(broadcaster: Broadcaster) -> Router {
    Router::new()
        .route("/live", get(live))
        .route("/health", get(health))
        .with_state(broadcaster)
}

async fn health(State(broadcaster): State<Broadcaster>) -> Json<Health> {
    Json(Health {
        status: "ok",
        subscribers: broadcaster.subscriber_count(),
    })
}

async fn live(ws: WebSocketUpgrade, State(broadcaster): State<Broadcaster>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_subscriber(socket, broadcaster))
}

async fn serve_subscriber(socket: WebSocket, broadcaster: Broadcaster) {
    let mut rx = broadcaster.subscribe();
    let id = Uuid::new_v4();
    info!(
        "Subscriber {} connected ({} total)",
        id,
        broadcaster.subscriber_count()
    );

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Ok(payload) => {
                    if let Err(e) = sender.send(Message::Binary(payload)).await {
                        warn!("Dropping subscriber {}: {}", id, e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber {} lagged, skipped {} messages", id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("Subscriber {} disconnected", id);
}
