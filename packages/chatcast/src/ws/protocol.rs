//! Frame formats
//!
//! Outbound frames are plain text, not JSON. The three shapes below are the
//! only things the server ever writes to a realtime session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A text frame the server writes to one or more sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Unicast reply to the sender of a message.
    Echo { text: String },
    /// Fan-out of a message to every registered session.
    Says { client_id: String, text: String },
    /// Fan-out to the survivors after a session closes.
    Disconnected { client_id: String },
}

impl fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerFrame::Echo { text } => write!(f, "You wrote: {}", text),
            ServerFrame::Says { client_id, text } => {
                write!(f, "Client #{} says: {}", client_id, text)
            }
            ServerFrame::Disconnected { client_id } => {
                write!(f, "Client #{} disconnected", client_id)
            }
        }
    }
}

/// Lifecycle of a single realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Connected,
    Closed,
}

impl SessionState {
    /// Registration moves a connecting session to connected. Any other
    /// starting state is left alone.
    pub fn on_registered(self) -> Self {
        match self {
            SessionState::Connecting => SessionState::Connected,
            other => other,
        }
    }

    /// Closure is terminal and only reachable from `Connected`.
    pub fn on_disconnect(self) -> Self {
        match self {
            SessionState::Connected => SessionState::Closed,
            other => other,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Body of `POST /submit`. `text` is passed through untouched, whatever its
/// JSON type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitPayload {
    #[serde(default)]
    pub text: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub received: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_format() {
        let frame = ServerFrame::Echo {
            text: "hi".to_string(),
        };
        assert_eq!(frame.to_string(), "You wrote: hi");
    }

    #[test]
    fn says_format() {
        let frame = ServerFrame::Says {
            client_id: "A".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(frame.to_string(), "Client #A says: hi");
    }

    #[test]
    fn disconnected_format() {
        let frame = ServerFrame::Disconnected {
            client_id: "B".to_string(),
        };
        assert_eq!(frame.to_string(), "Client #B disconnected");
    }

    #[test]
    fn text_is_not_escaped() {
        let frame = ServerFrame::Says {
            client_id: "x y".to_string(),
            text: "<b>{}</b>".to_string(),
        };
        assert_eq!(frame.to_string(), "Client #x y says: <b>{}</b>");
    }

    #[test]
    fn state_transitions() {
        let s = SessionState::Connecting;
        assert_eq!(s.on_disconnect(), SessionState::Connecting);
        let s = s.on_registered();
        assert_eq!(s, SessionState::Connected);
        assert_eq!(s.on_registered(), SessionState::Connected);
        let s = s.on_disconnect();
        assert_eq!(s, SessionState::Closed);
        assert_eq!(s.on_registered(), SessionState::Closed);
    }

    #[test]
    fn submit_payload_missing_text() {
        let p: SubmitPayload = serde_json::from_str("{}").unwrap();
        assert!(p.text.is_none());
        let json = serde_json::to_value(SubmitResponse { received: p.text }).unwrap();
        assert_eq!(json, serde_json::json!({ "received": null }));
    }

    #[test]
    fn submit_payload_non_string_text() {
        let p: SubmitPayload = serde_json::from_str(r#"{"text": 42}"#).unwrap();
        assert_eq!(p.text, Some(serde_json::json!(42)));
    }
}
