//! Messaging API
//!
//! Thin REST client for conversations and message history. Owns no policy:
//! encryption, gating, and dedup all happen in the layers above.

use el_common::{Conversation, Message};
use el_crypto::WrappedKeyMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ClientConfig;

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("Backend returned {status} for {context}")]
    Status {
        status: reqwest::StatusCode,
        context: String,
    },
}

/// API result type.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Outgoing message payload.
#[derive(Debug, Serialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachment_ids: Vec<Uuid>,
    pub is_encrypted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_keys: Option<WrappedKeyMap>,
}

/// Send acknowledgement. The backend may hold a message back (rather than
/// deliver it) when moderation queues it for review.
#[derive(Debug, Deserialize)]
pub struct SendReceipt {
    pub message: Message,
    #[serde(default)]
    pub queued: bool,
    #[serde(default)]
    pub queued_message: Option<String>,
}

/// REST client for the messaging backend.
pub struct MessagingApi {
    http: reqwest::Client,
    config: ClientConfig,
}

impl MessagingApi {
    /// Create an API client.
    #[must_use]
    pub fn new(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.access_token)
    }

    async fn check(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                status: response.status(),
                context: context.to_string(),
            })
        }
    }

    /// List the user's conversations.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn get_conversations(&self) -> Result<Vec<Conversation>> {
        let url = self.config.api_url("conversations/");
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response, "conversations").await?.json().await?)
    }

    /// Fetch one conversation with its participants.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn get_conversation(&self, conversation_id: Uuid) -> Result<Conversation> {
        let url = self
            .config
            .api_url(&format!("conversations/{conversation_id}/"));
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response, "conversation").await?.json().await?)
    }

    /// Fetch a conversation's message history.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let url = self
            .config
            .api_url(&format!("conversations/{conversation_id}/messages/"));
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response, "messages").await?.json().await?)
    }

    /// Send a message to a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        payload: &OutgoingMessage,
    ) -> Result<SendReceipt> {
        let url = self
            .config
            .api_url(&format!("conversations/{conversation_id}/messages/"));
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.bearer())
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(response, "send message").await?.json().await?)
    }

    /// Start (or return the existing) conversation with a participant.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn create_conversation(&self, participant_id: Uuid) -> Result<Conversation> {
        let url = self.config.api_url("conversations/");
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "participant_id": participant_id }))
            .send()
            .await?;
        Ok(Self::check(response, "create conversation")
            .await?
            .json()
            .await?)
    }
}
