//! Connection Registry
//!
//! The set of currently open realtime sessions. Entries are keyed by a
//! server-assigned `ConnectionId`, so two sessions that present the same
//! client id coexist as separate entries.

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Transport identity of one session. Allocated in increasing order, so
/// iterating by id is iterating in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[cfg(test)]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Queue feeding one session's writer task.
pub type OutboundSender = mpsc::Sender<Utf8Bytes>;

/// A registered session. Cloning is cheap; clones share the outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub connection_id: ConnectionId,
    pub client_id: String,
    pub connected_at: DateTime<Utc>,
    sender: OutboundSender,
}

impl SessionHandle {
    pub fn sender(&self) -> &OutboundSender {
        &self.sender
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            connection_id: self.connection_id,
            client_id: self.client_id.clone(),
            connected_at: self.connected_at.to_rfc3339(),
        }
    }
}

/// Serializable view of a session for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub connection_id: ConnectionId,
    pub client_id: String,
    pub connected_at: String,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<BTreeMap<ConnectionId, SessionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session and return its handle.
    pub async fn register(
        &self,
        client_id: impl Into<String>,
        sender: OutboundSender,
    ) -> SessionHandle {
        let client_id = client_id.into();
        let connection_id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let handle = SessionHandle {
            connection_id,
            client_id,
            connected_at: Utc::now(),
            sender,
        };

        let mut sessions = self.sessions.write().await;
        if sessions.values().any(|s| s.client_id == handle.client_id) {
            debug!(
                client_id = %handle.client_id,
                conn_id = %connection_id,
                "Client id already registered, keeping both sessions"
            );
        }
        sessions.insert(connection_id, handle.clone());
        handle
    }

    /// Remove a session. Returns false if it was not registered.
    pub async fn deregister(&self, connection_id: ConnectionId) -> bool {
        self.sessions.write().await.remove(&connection_id).is_some()
    }

    /// Registration-ordered copy of the current membership. The lock is
    /// released before this returns, so callers may send without holding it.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn sessions(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .await
            .values()
            .map(SessionHandle::summary)
            .collect()
    }

    #[cfg(test)]
    pub async fn contains(&self, connection_id: ConnectionId) -> bool {
        self.sessions.read().await.contains_key(&connection_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (OutboundSender, mpsc::Receiver<Utf8Bytes>) {
        mpsc::channel(8)
    }

    #[tokio::test]
    async fn register_and_deregister() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();

        let handle = registry.register("alice", tx).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(handle.connection_id).await);

        assert!(registry.deregister(handle.connection_id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn deregister_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let handle = registry.register("alice", tx).await;

        assert!(registry.deregister(handle.connection_id).await);
        assert!(!registry.deregister(handle.connection_id).await);
        assert!(!registry.deregister(ConnectionId(999)).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_client_ids_coexist() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let a = registry.register("same", tx1).await;
        let b = registry.register("same", tx2).await;
        assert_ne!(a.connection_id, b.connection_id);
        assert_eq!(registry.len().await, 2);

        registry.deregister(a.connection_id).await;
        assert!(registry.contains(b.connection_id).await);
    }

    #[tokio::test]
    async fn snapshot_preserves_registration_order() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for name in ["c", "a", "b"] {
            let (tx, rx) = channel();
            receivers.push(rx);
            registry.register(name, tx).await;
        }

        let ids: Vec<String> = registry
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.client_id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn snapshot_is_stable_across_mutation() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let a = registry.register("a", tx1).await;
        registry.register("b", tx2).await;

        let snap = registry.snapshot().await;
        registry.deregister(a.connection_id).await;

        assert_eq!(snap.len(), 2);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn summaries_serialize() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let handle = registry.register("alice", tx).await;

        let sessions = registry.sessions().await;
        assert_eq!(sessions.len(), 1);
        let json = serde_json::to_value(&sessions[0]).unwrap();
        assert_eq!(json["client_id"], "alice");
        assert_eq!(json["connection_id"], handle.connection_id.as_u64());
        chrono::DateTime::parse_from_rfc3339(json["connected_at"].as_str().unwrap()).unwrap();
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
    }
}
