use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::ServerMessage;
use crate::state::AppState;
use crate::ws::ConnectionHandle;
use super::router::MessageRouter;

/// WebSocket handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("New WebSocket connection attempt");
    let router = state.router.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, router))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, router: Arc<MessageRouter>) {
    // Transport-assigned identity; never derived from the peer address.
    let connection_id = Uuid::new_v4();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Writer task: the only place that touches the sink. When it ends the
    // receiver is dropped and the connection handle reports closed.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {} for {}: {}", msg.kind(), connection_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    router.connect(ConnectionHandle::new(connection_id, tx));

    // Frames of one connection are handled strictly in order.
    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => router.handle_text(connection_id, &text).await,
                Some(Ok(Message::Binary(_))) => {
                    warn!("Ignoring binary frame from {}", connection_id);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    router.disconnect(connection_id).await;
    info!("WebSocket connection {} terminated", connection_id);
}
