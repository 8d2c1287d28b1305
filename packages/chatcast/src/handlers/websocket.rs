use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use tracing::warn;

use crate::AppState;
use crate::ws;

/// Realtime endpoint. The path segment is the client id, taken as-is.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let broadcaster = state.broadcaster.clone();
    let metrics = state.metrics.clone();
    let send_queue_capacity = state.server_config.websocket.send_queue_capacity;

    let failed_metrics = state.metrics.clone();
    let failed_client_id = client_id.clone();

    ws.on_failed_upgrade(move |e| {
        failed_metrics.websocket_error();
        warn!(client_id = %failed_client_id, "WebSocket upgrade failed: {}", e);
    })
    .on_upgrade(move |socket| {
        ws::handle_session(
            socket,
            client_id,
            broadcaster,
            Some(metrics),
            send_queue_capacity,
        )
    })
}
