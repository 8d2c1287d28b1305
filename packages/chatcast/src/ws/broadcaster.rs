//! Broadcaster
//!
//! Fans one frame out to every session in the registry. Each recipient is
//! an independent `try_send` into that session's outbound queue: a full or
//! closed queue drops the frame for that recipient only.

use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;

use super::protocol::ServerFrame;
use super::registry::ConnectionRegistry;

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Option<Arc<ServerMetrics>>) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `frame` to every session registered at the moment of the call.
    pub async fn publish(&self, frame: &ServerFrame) -> DeliveryReport {
        let text = Utf8Bytes::from(frame.to_string());
        let recipients = self.registry.snapshot().await;
        let mut report = DeliveryReport::default();

        for session in &recipients {
            match session.sender().try_send(text.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(
                        conn_id = %session.connection_id,
                        client_id = %session.client_id,
                        "Outbound queue full, dropping broadcast frame"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    // Writer already gone; the session's own cleanup will deregister it.
                    report.dropped += 1;
                    debug!(
                        conn_id = %session.connection_id,
                        "Recipient closed before broadcast delivery"
                    );
                }
            }
        }

        if let Some(ref m) = self.metrics {
            m.broadcast_started();
            m.frames_delivered(report.delivered as u64);
            m.frames_dropped(report.dropped as u64);
        }

        debug!(
            recipients = recipients.len(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast complete"
        );
        report
    }
}
