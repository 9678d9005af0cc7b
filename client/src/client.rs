//! Messaging Client
//!
//! Facade wiring the messaging core together: key management, per-send
//! encryption negotiation, hybrid encryption, the visibility gate, and
//! push/fetch delivery merging.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use el_common::protocol::ServerEvent;
use el_common::{Conversation, Message};
use el_crypto::KeyPair;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiError, MessagingApi, OutgoingMessage, SendReceipt};
use crate::config::ClientConfig;
use crate::crypto::{KeyManager, KeyManagerError};
use crate::directory::{DirectoryError, HttpKeyDirectory, KeyDirectory};
use crate::negotiator::{negotiate, Negotiation};
use crate::network::PushChannel;
use crate::sync::{DeliverySource, DeliverySync};
use crate::visibility::{render_content, RenderedContent};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// REST API error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Key directory error.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Key management error.
    #[error(transparent)]
    Keys(#[from] KeyManagerError),

    /// Internal task failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Client result type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Result of sending a message.
#[derive(Debug)]
pub struct SendOutcome {
    /// The message as the backend recorded it.
    pub message: Message,
    /// Whether the content went out encrypted.
    pub encrypted: bool,
    /// Moderation notice when the backend queued the message instead of
    /// delivering it.
    pub queued_notice: Option<String>,
}

/// The messaging core for one authenticated user.
pub struct MessagingClient {
    user_id: Uuid,
    api: MessagingApi,
    directory: Arc<dyn KeyDirectory>,
    keys: KeyManager,
    sync: DeliverySync,
    channels: Mutex<HashMap<Uuid, PushChannel>>,
    conversations: Arc<Mutex<HashMap<Uuid, Conversation>>>,
    config: ClientConfig,
}

impl MessagingClient {
    /// Assemble the client for an authenticated user.
    ///
    /// # Arguments
    ///
    /// * `config` - Backend connection settings
    /// * `data_dir` - Directory for the local key store
    /// * `user_id` - The authenticated user's ID
    /// * `store_key` - 32-byte key encrypting the key store at rest
    ///
    /// # Errors
    ///
    /// Returns an error if the local key store cannot be opened.
    pub fn new(
        config: ClientConfig,
        data_dir: PathBuf,
        user_id: Uuid,
        store_key: [u8; 32],
    ) -> Result<Self> {
        let http = reqwest::Client::new();
        let api = MessagingApi::new(http.clone(), config.clone());
        let directory = Arc::new(HttpKeyDirectory::new(http, config.clone()));
        let keys = KeyManager::init(data_dir, user_id, store_key)?;

        Ok(Self {
            user_id,
            api,
            directory,
            keys,
            sync: DeliverySync::new(user_id),
            channels: Mutex::new(HashMap::new()),
            conversations: Arc::new(Mutex::new(HashMap::new())),
            config,
        })
    }

    /// The REST API client, for conversation listing and bookkeeping.
    #[must_use]
    pub const fn api(&self) -> &MessagingApi {
        &self.api
    }

    /// Fetch the user's conversations and refresh the local summary cache.
    ///
    /// # Errors
    ///
    /// Returns an error on API failure.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let list = self.api.get_conversations().await?;
        let mut cache = self.conversations.lock().await;
        cache.clear();
        for conversation in &list {
            cache.insert(conversation.id, conversation.clone());
        }
        Ok(list)
    }

    /// The cached summary of a conversation, if it has been listed.
    pub async fn conversation_summary(&self, conversation_id: Uuid) -> Option<Conversation> {
        self.conversations.lock().await.get(&conversation_id).cloned()
    }

    /// Ensure the local user has a usable key pair, generating and backing
    /// one up on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or generation fails.
    pub async fn initialize_encryption(&self) -> Result<KeyPair> {
        Ok(self
            .keys
            .get_or_create_key_pair(self.directory.as_ref())
            .await?)
    }

    /// Send a message, encrypting when every participant can receive it.
    ///
    /// Negotiation is recomputed for this send; if any peer lacks a key, or
    /// encryption itself fails, the message degrades to plaintext rather
    /// than failing the send.
    ///
    /// # Errors
    ///
    /// Returns an error on API failure or when the local key pair cannot be
    /// established.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        attachment_ids: Vec<Uuid>,
    ) -> Result<SendOutcome> {
        let conversation = self.api.get_conversation(conversation_id).await?;
        let mut payload = self.prepare_outgoing(&conversation, content).await?;
        payload.attachment_ids = attachment_ids;
        let encrypted = payload.is_encrypted;

        let receipt = self.api.send_message(conversation_id, &payload).await?;
        let SendReceipt {
            message,
            queued,
            queued_message,
        } = receipt;

        if !queued {
            self.sync
                .admit(conversation_id, message.clone(), DeliverySource::Fetch)
                .await;
            if let Some(summary) = self.conversations.lock().await.get_mut(&conversation_id) {
                summary.note_message(&message, self.user_id, true);
            }
        }

        Ok(SendOutcome {
            message,
            encrypted,
            queued_notice: queued.then(|| {
                queued_message.unwrap_or_else(|| "Message queued for review".to_string())
            }),
        })
    }

    /// Build the outgoing payload, negotiating encryption per send.
    async fn prepare_outgoing(
        &self,
        conversation: &Conversation,
        content: &str,
    ) -> Result<OutgoingMessage> {
        let own = self.initialize_encryption().await?;

        let negotiation = negotiate(
            self.directory.as_ref(),
            conversation,
            self.user_id,
            &own.public_key,
        )
        .await?;

        Self::payload_for(negotiation, content, conversation.id).await
    }

    /// Turn a negotiation outcome into the outgoing payload. Encryption
    /// failures degrade to plaintext with `is_encrypted = false`; the
    /// content is never dropped or altered on the fallback path.
    async fn payload_for(
        negotiation: Negotiation,
        content: &str,
        conversation_id: Uuid,
    ) -> Result<OutgoingMessage> {
        match negotiation {
            Negotiation::Ready(capability) => {
                let plaintext = content.to_string();
                let recipients = capability.recipients;
                let result = tokio::task::spawn_blocking(move || {
                    el_crypto::encrypt_message(&plaintext, &recipients)
                })
                .await
                .map_err(|e| ClientError::Internal(format!("encryption task failed: {e}")))?;

                match result {
                    Ok((envelope, wrapped_keys)) => Ok(OutgoingMessage {
                        content: envelope.to_hex(),
                        attachment_ids: Vec::new(),
                        is_encrypted: true,
                        encrypted_keys: Some(wrapped_keys),
                    }),
                    Err(e) => {
                        // A failed encryption must not lose the message.
                        warn!(conversation = %conversation_id, "Encryption failed, sending plaintext: {e}");
                        Ok(Self::plaintext_payload(content))
                    }
                }
            }
            Negotiation::Unavailable { missing } => {
                info!(
                    conversation = %conversation_id,
                    missing = missing.len(),
                    "Peer keys missing, sending plaintext"
                );
                Ok(Self::plaintext_payload(content))
            }
        }
    }

    fn plaintext_payload(content: &str) -> OutgoingMessage {
        OutgoingMessage {
            content: content.to_string(),
            attachment_ids: Vec::new(),
            is_encrypted: false,
            encrypted_keys: None,
        }
    }

    /// Open a conversation: start its timeline and push channel. Returns a
    /// receiver yielding each newly admitted message (duplicates and gated
    /// push deliveries are filtered out before they reach it).
    pub async fn open_conversation(&self, conversation_id: Uuid) -> mpsc::Receiver<Message> {
        self.sync.open(conversation_id).await;

        let (channel, mut events) = PushChannel::connect(self.config.clone(), conversation_id);
        self.channels.lock().await.insert(conversation_id, channel);

        let (admitted_tx, admitted_rx) = mpsc::channel::<Message>(100);
        let sync = self.sync.clone();
        let conversations = self.conversations.clone();
        let viewer = self.user_id;
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ServerEvent::MessageNew { message } => {
                        let message = *message;
                        if !sync
                            .admit(conversation_id, message.clone(), DeliverySource::Push)
                            .await
                        {
                            continue;
                        }
                        if let Some(summary) =
                            conversations.lock().await.get_mut(&conversation_id)
                        {
                            summary.note_message(&message, viewer, true);
                        }
                        if admitted_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    ServerEvent::Ready { user_id } => {
                        debug!(%conversation_id, %user_id, "Push channel ready");
                    }
                    ServerEvent::Pong => {}
                    ServerEvent::Error { code, message } => {
                        warn!(%conversation_id, code, "Push channel error: {message}");
                    }
                }
            }
        });

        admitted_rx
    }

    /// Fetch a conversation's history and merge it into the timeline.
    /// Returns the full timeline snapshot in admission order.
    ///
    /// # Errors
    ///
    /// Returns an error on API failure.
    pub async fn load_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let history = self.api.get_messages(conversation_id).await?;
        for message in history {
            self.sync
                .admit(conversation_id, message, DeliverySource::Fetch)
                .await;
        }
        Ok(self.sync.snapshot(conversation_id).await)
    }

    /// Close a conversation: tear down the push channel and drop its
    /// timeline. In-flight deliveries that lose the race are discarded.
    pub async fn close_conversation(&self, conversation_id: Uuid) {
        if let Some(mut channel) = self.channels.lock().await.remove(&conversation_id) {
            channel.disconnect().await;
        }
        self.sync.close(conversation_id).await;
    }

    /// Resolve what this user should see for a message: the visibility gate
    /// first, then decryption with the local key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the local key store cannot be read.
    pub fn render_message(&self, message: &Message) -> Result<RenderedContent> {
        let keys = self.keys.key_pair()?;
        Ok(render_content(message, self.user_id, keys.as_ref()))
    }
}
