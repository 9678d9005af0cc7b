//! Message Types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserProfile;

/// File attachment metadata. The file itself lives in external storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment ID.
    pub id: Uuid,
    /// Download URL.
    pub file_url: String,
    /// Original file name.
    pub file_name: String,
    /// MIME type.
    pub file_type: String,
    /// Size in bytes.
    pub file_size: u64,
}

/// A conversation message.
///
/// Immutable once created. For encrypted messages `content` carries the
/// transport envelope (`hex(iv || ciphertext)`) and `encrypted_keys` maps
/// every participant — sender included — to their wrapped symmetric key.
///
/// `is_visible_to_recipient` is set by the booking-aware backend and is
/// authoritative for the visibility gate; absence means visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message ID.
    pub id: Uuid,
    /// The author.
    pub sender: UserProfile,
    /// Body: plaintext, a transport envelope, or nothing (attachment-only).
    pub content: Option<String>,
    /// Attached files.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether `content` is an encrypted envelope.
    #[serde(default)]
    pub is_encrypted: bool,
    /// Wrapped symmetric key per participant, for encrypted messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_keys: Option<HashMap<Uuid, String>>,
    /// Booking-gate flag: `Some(false)` hides the content from everyone but
    /// the sender until the external condition is met.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible_to_recipient: Option<bool>,
}

impl Message {
    /// Whether `viewer` authored this message.
    #[must_use]
    pub fn is_authored_by(&self, viewer: Uuid) -> bool {
        self.sender.id == viewer
    }

    /// Whether the booking gate currently hides this message from its
    /// recipients. An absent flag means visible.
    #[must_use]
    pub fn hidden_from_recipient(&self) -> bool {
        self.is_visible_to_recipient == Some(false)
    }

    /// The viewer's wrapped key, if the message carries one for them.
    #[must_use]
    pub fn wrapped_key_for(&self, viewer: Uuid) -> Option<&str> {
        self.encrypted_keys
            .as_ref()
            .and_then(|keys| keys.get(&viewer))
            .map(String::as_str)
    }
}
