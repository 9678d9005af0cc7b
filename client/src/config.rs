//! Client Configuration
//!
//! Explicit configuration passed to every component; no ambient globals.

use uuid::Uuid;

/// Connection settings for the messaging backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the platform backend, e.g. `https://edulab.example`.
    pub server_url: String,
    /// Opaque access credential presented on every request and on the push
    /// channel. Issued elsewhere; this core never refreshes it.
    pub access_token: String,
}

impl ClientConfig {
    /// Build an absolute REST URL for an API path.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Build the push-channel URL for a conversation, with the access token.
    #[must_use]
    pub fn ws_url(&self, conversation_id: Uuid) -> String {
        let base = self
            .server_url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        format!(
            "{}/ws/chat/{}/?token={}",
            base.trim_end_matches('/'),
            conversation_id,
            self.access_token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_joins_cleanly() {
        let config = ClientConfig {
            server_url: "https://edulab.example/".into(),
            access_token: "tok".into(),
        };
        assert_eq!(
            config.api_url("/conversations/"),
            "https://edulab.example/api/conversations/"
        );
    }

    #[test]
    fn test_ws_url_scheme_and_token() {
        let config = ClientConfig {
            server_url: "https://edulab.example".into(),
            access_token: "tok".into(),
        };
        let id = Uuid::nil();
        let url = config.ws_url(id);
        assert!(url.starts_with("wss://edulab.example/ws/chat/"));
        assert!(url.ends_with("/?token=tok"));
    }
}
