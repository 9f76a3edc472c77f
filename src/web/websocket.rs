//! WebSocket streaming of the latest readings.

use crate::web::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Holds one slot of the connection limit until dropped.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn acquire(counter: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max).then_some(current + 1)
            })
            .ok()
            .map(|_| Self(Arc::clone(counter)))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// WebSocket upgrade handler. Refuses with 503 once the connection limit is reached.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    match ConnectionSlot::acquire(&state.connections, state.max_websocket_connections) {
        Some(slot) => ws.on_upgrade(move |socket| handle_websocket(socket, state, slot)),
        None => {
            warn!("WebSocket connection limit reached");
            (StatusCode::SERVICE_UNAVAILABLE, "too many WebSocket connections").into_response()
        }
    }
}

/// Send the current readings, then every new sample until either side goes away.
async fn handle_websocket(socket: WebSocket, state: AppState, _slot: ConnectionSlot) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket client connected: {}", client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut snapshots = state.snapshots.clone();

    let client_id_send = client_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let json = {
                let snapshot = snapshots.borrow_and_update();
                serde_json::to_string(&snapshot.readings)
            };
            match json {
                Ok(json) => {
                    if let Err(e) = sender.send(Message::Text(json)).await {
                        debug!("Failed to send to client {}: {}", client_id_send, e);
                        break;
                    }
                }
                Err(e) => warn!("Failed to serialize readings: {}", e),
            }
            if snapshots.changed().await.is_err() {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    });

    let client_id_recv = client_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket error for client {}: {}", client_id_recv, e);
                    break;
                }
            }
        }
    });

    match first_to_finish(send_task, recv_task).await {
        Finished::Send => debug!("Send task completed for client {}", client_id),
        Finished::Receive => debug!("Receive task completed for client {}", client_id),
    }

    info!("WebSocket client disconnected: {}", client_id);
}

#[derive(Debug, PartialEq, Eq)]
enum Finished {
    Send,
    Receive,
}

/// Wait for either half of a connection to end, then abort the other so it
/// cannot outlive the connection slot.
async fn first_to_finish<S, R>(mut send: JoinHandle<S>, mut recv: JoinHandle<R>) -> Finished {
    tokio::select! {
        _ = &mut send => {
            recv.abort();
            Finished::Send
        }
        _ = &mut recv => {
            send.abort();
            Finished::Receive
        }
    }
}
