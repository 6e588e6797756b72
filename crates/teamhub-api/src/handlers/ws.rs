//! WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use teamhub_realtime::ConnectionHub;

use crate::state::AppState;

/// GET /ws: WebSocket upgrade.
///
/// Identity is not taken from the transport; the first `join` frame names
/// the key and the hub checks project membership.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = Arc::clone(&state.realtime.hub);
    ws.on_upgrade(move |socket| handle_socket(hub, socket))
}

/// Drives one established connection until either side closes.
async fn handle_socket(hub: Arc<ConnectionHub>, socket: WebSocket) {
    let (handle, mut outbound_rx) = hub.register();
    let conn_id = handle.id;
    let closed = handle.closed();
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                // Flush whatever the hub queued before dropping us.
                while let Ok(frame) = outbound_rx.try_recv() {
                    if send_text(&mut ws_tx, frame).await.is_err() {
                        break;
                    }
                }
                let _ = ws_tx.send(Message::Close(None)).await;
                debug!(conn_id = %conn_id, "Connection closed by server");
                break;
            }
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    if send_text(&mut ws_tx, frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    hub.handle_inbound(&conn_id, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            },
        }
    }

    hub.unregister(&conn_id).await;
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

async fn send_text(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    frame: String,
) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(frame.into())).await
}
