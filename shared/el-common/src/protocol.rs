//! Push-Channel Protocol
//!
//! Wire events for the per-conversation realtime stream. The stream is
//! ordered and at-least-once: the same message id may be delivered more
//! than once (and also arrive via a request/response fetch), so consumers
//! must deduplicate on admission.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Message;

/// Events the client sends upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Keepalive.
    Ping,
}

/// Events the server pushes to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection accepted and authenticated.
    Ready { user_id: Uuid },
    /// Keepalive reply.
    Pong,
    /// A new message in the subscribed conversation.
    MessageNew { message: Box<Message> },
    /// Server-side failure for this connection.
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_tagged_parse() {
        let json = r#"{
            "type": "message_new",
            "message": {
                "id": "0191f3a0-0000-7000-8000-000000000001",
                "sender": {"id": "0191f3a0-0000-7000-8000-0000000000aa", "name": "Alice"},
                "content": "hi",
                "created_at": "2025-01-15T10:00:00Z"
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::MessageNew { .. }));
    }

    #[test]
    fn test_client_ping_shape() {
        let json = serde_json::to_string(&ClientEvent::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }
}
