//! Conversation Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Message, UserProfile};

/// A conversation between two or more participants.
///
/// The participant set is fixed at creation as far as the messaging core is
/// concerned; membership changes are handled elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation ID.
    pub id: Uuid,
    /// Everyone in the conversation, including the local user.
    pub participants: Vec<UserProfile>,
    /// Most recent message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    /// Unread message count for the local user.
    #[serde(default)]
    pub unread_count: u32,
    /// Timestamp of the most recent message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Participants other than `viewer`.
    pub fn peers_of(&self, viewer: Uuid) -> impl Iterator<Item = &UserProfile> {
        self.participants.iter().filter(move |p| p.id != viewer)
    }

    /// Update summary bookkeeping for a newly admitted message.
    ///
    /// An open conversation stays read; otherwise messages from peers bump
    /// the unread count.
    pub fn note_message(&mut self, message: &Message, viewer: Uuid, is_open: bool) {
        self.last_message_at = Some(message.created_at);
        self.last_message = Some(message.clone());
        if is_open {
            self.unread_count = 0;
        } else if !message.is_authored_by(viewer) {
            self.unread_count += 1;
        }
    }
}
