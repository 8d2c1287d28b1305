//! Session Handler
//!
//! Owns one realtime session from registration to cleanup. Inbound text
//! frames are handled one at a time in arrival order: echo to the sender,
//! then fan out to everyone. However the session ends, it is deregistered
//! and the survivors are told.

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics::ServerMetrics;

use super::broadcaster::Broadcaster;
use super::protocol::{ServerFrame, SessionState};

/// Why a session stopped. All variants get the same cleanup; the
/// distinction only shows up in logs and the error counter.
#[derive(Debug, thiserror::Error)]
pub enum SessionEnd {
    #[error("client sent a close frame")]
    Closed,

    #[error("stream ended without a close frame")]
    Eof,

    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("outbound writer stopped")]
    WriterGone,
}

/// Handle a realtime session for `client_id` over an upgraded socket.
pub async fn handle_session(
    socket: WebSocket,
    client_id: String,
    broadcaster: Broadcaster,
    server_metrics: Option<Arc<ServerMetrics>>,
    send_queue_capacity: usize,
) {
    let mut state = SessionState::Connecting;
    let registry = broadcaster.registry().clone();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending frames to the WebSocket
    let (tx, mut rx) = mpsc::channel::<Utf8Bytes>(send_queue_capacity.max(1));

    let handle = registry.register(client_id.clone(), tx.clone()).await;
    let conn_id = handle.connection_id;
    state = state.on_registered();
    if let Some(ref m) = server_metrics {
        m.connection_opened();
    }
    info!(
        conn_id = %conn_id,
        client_id = %client_id,
        state = %state,
        "Session registered"
    );

    // Task to drain the outbound queue into the socket
    let sender_task = async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                debug!(conn_id = %conn_id, "Write failed: {}", e);
                break;
            }
        }
        SessionEnd::WriterGone
    };

    // Task to handle incoming frames
    let input_task = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(ref m) = server_metrics {
                        m.message_received();
                    }
                    debug!(conn_id = %conn_id, len = text.as_str().len(), "Received text frame");

                    let text = text.as_str().to_owned();
                    let echo = ServerFrame::Echo { text: text.clone() };
                    if tx.send(Utf8Bytes::from(echo.to_string())).await.is_err() {
                        return SessionEnd::WriterGone;
                    }
                    if let Some(ref m) = server_metrics {
                        m.frames_delivered(1);
                    }

                    broadcaster
                        .publish(&ServerFrame::Says {
                            client_id: client_id.clone(),
                            text,
                        })
                        .await;
                }
                Ok(Message::Binary(data)) => {
                    debug!(conn_id = %conn_id, len = data.len(), "Ignoring binary frame");
                }
                Ok(Message::Close(_)) => return SessionEnd::Closed,
                Ok(_) => {}
                Err(e) => return SessionEnd::Transport(e),
            }
        }
        SessionEnd::Eof
    };

    let end = tokio::select! {
        end = sender_task => end,
        end = input_task => end,
    };

    let removed = registry.deregister(conn_id).await;
    state = state.on_disconnect();

    match &end {
        SessionEnd::Transport(e) => {
            if let Some(ref m) = server_metrics {
                m.websocket_error();
            }
            warn!(conn_id = %conn_id, client_id = %client_id, "Session ended: {}", e);
        }
        other => {
            info!(
                conn_id = %conn_id,
                client_id = %client_id,
                state = %state,
                "Session ended: {}", other
            );
        }
    }

    if removed {
        if let Some(ref m) = server_metrics {
            m.connection_closed();
        }
        broadcaster
            .publish(&ServerFrame::Disconnected { client_id })
            .await;
    }
}
