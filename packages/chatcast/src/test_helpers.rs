use std::net::SocketAddr;
use std::time::Duration;

use crate::AppState;
use crate::config::{ServerConfig, ServerFileConfig};

/// Build an `AppState` with default config and a fresh, empty registry.
pub fn test_app_state() -> AppState {
    AppState::new(ServerConfig::from_file(&ServerFileConfig::default()))
}

/// Serve the full router on an ephemeral loopback port.
///
/// Returns the bound address and the state backing the server, so tests can
/// inspect the registry and metrics while clients talk to it.
pub async fn spawn_test_server() -> (SocketAddr, AppState) {
    let state = test_app_state();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let app = crate::app_router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

/// Wait until exactly `expected` sessions are registered.
///
/// The upgrade callback runs after the client's handshake completes, so a
/// freshly connected client may not be registered yet.
pub async fn wait_for_sessions(state: &AppState, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let n = state.registry.len().await;
        if n == expected {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("expected {} registered sessions, found {}", expected, n);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
