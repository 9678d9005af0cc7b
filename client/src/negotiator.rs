//! Encryption Negotiator
//!
//! Decides, per outgoing message, whether end-to-end encryption is possible
//! for a conversation. Encryption is all-or-nothing: every participant other
//! than the sender must have a published public key, otherwise the message
//! can only go out as plaintext. The decision is recomputed on every send so
//! a peer publishing a key mid-conversation upgrades the very next message.

use el_common::Conversation;
use tracing::debug;
use uuid::Uuid;

use crate::directory::{KeyDirectory, PeerKeyStatus};

/// Everyone a ready negotiation will wrap the content key for: each peer
/// plus the sender, paired with their public key PEM.
#[derive(Debug, Clone)]
pub struct Capability {
    pub recipients: Vec<(Uuid, String)>,
}

/// Outcome of a per-send negotiation.
#[derive(Debug, Clone)]
pub enum Negotiation {
    /// All peers hold published keys; encrypt for these recipients.
    Ready(Capability),
    /// At least one peer has no published key. Plaintext is the only option.
    Unavailable {
        /// Peers with no published key.
        missing: Vec<Uuid>,
    },
}

impl Negotiation {
    /// Whether encryption can proceed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Negotiate encryption for one outgoing message.
///
/// Resolves every peer (participants minus the sender) through the
/// directory. The sender is always included as a recipient with
/// `sender_public_key` so they can read their own sent messages.
///
/// # Errors
///
/// Returns an error only on directory transport failure; a peer simply
/// lacking a key yields `Negotiation::Unavailable`.
pub async fn negotiate(
    directory: &dyn KeyDirectory,
    conversation: &Conversation,
    sender_id: Uuid,
    sender_public_key: &str,
) -> crate::directory::Result<Negotiation> {
    let mut recipients = vec![(sender_id, sender_public_key.to_string())];
    let mut missing = Vec::new();

    for peer in conversation.peers_of(sender_id) {
        // Prefer the key embedded in the participant profile; fall back to a
        // directory lookup when the conversation payload predates the key.
        let status = match peer.public_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => PeerKeyStatus::Known(key.to_string()),
            None => directory.public_key_of(peer.id).await?,
        };
        match status {
            PeerKeyStatus::Known(key) => recipients.push((peer.id, key)),
            PeerKeyStatus::Unknown => missing.push(peer.id),
        }
    }

    if missing.is_empty() {
        debug!(conversation = %conversation.id, recipients = recipients.len(), "Encryption ready");
        Ok(Negotiation::Ready(Capability { recipients }))
    } else {
        debug!(conversation = %conversation.id, missing = missing.len(), "Encryption unavailable");
        Ok(Negotiation::Unavailable { missing })
    }
}
