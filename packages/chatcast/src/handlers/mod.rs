pub mod health;
pub mod submit;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, list_sessions_handler, metrics_handler};
pub use submit::submit_handler;
pub use websocket::websocket_handler;
