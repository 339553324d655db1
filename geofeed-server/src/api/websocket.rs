use super::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use geofeed::Snapshot;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// GET /api/ws - pushes the current snapshot, then every new one
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("WebSocket upgrade request received");
    let snapshots = state.manager.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, snapshots))
}

/// Handle WebSocket connection lifecycle.
///
/// A slow client only ever sees the newest snapshot; intermediate ones are
/// skipped rather than queued.
async fn handle_socket(mut socket: WebSocket, mut snapshots: watch::Receiver<Arc<Snapshot>>) {
    info!("WebSocket connection established");

    let initial = snapshots.borrow_and_update().clone();
    if let Err(e) = send_snapshot(&mut socket, &initial).await {
        warn!(error = %e, "Failed to send initial snapshot");
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Read-only stream; client text is ignored
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Snapshot publisher dropped");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Err(e) = send_snapshot(&mut socket, &snapshot).await {
                    error!(error = %e, "Failed to send snapshot");
                    break;
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &Snapshot) -> anyhow::Result<()> {
    let json = serde_json::to_string(snapshot)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
