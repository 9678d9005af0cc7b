//! Delivery Synchronizer
//!
//! Merges the two delivery paths for a conversation — live push and history
//! fetch — into one timeline with exactly-once admission per message ID.
//! Opening a conversation races both paths, so the same message routinely
//! arrives twice; admission order (first arrival wins) decides placement.
//!
//! Push and fetch treat gated messages differently on purpose: a pushed
//! message hidden from this viewer is dropped before admission, so it never
//! occupies a timeline slot and is never marked seen. The same message
//! arriving later via fetch is admitted normally and redacted at render
//! time by the visibility gate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use el_common::Message;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

/// Which path delivered a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    /// Live push channel.
    Push,
    /// History fetch over REST.
    Fetch,
}

/// Ordered, deduplicated message timeline for one conversation.
#[derive(Debug, Default)]
pub struct ConversationTimeline {
    messages: Vec<Message>,
    admitted: HashSet<Uuid>,
}

impl ConversationTimeline {
    /// Admit a delivered message. Returns `true` if the message entered the
    /// timeline, `false` if it was a duplicate or was dropped by the push
    /// filter.
    pub fn admit(&mut self, message: Message, source: DeliverySource, viewer: Uuid) -> bool {
        if self.admitted.contains(&message.id) {
            trace!(message_id = %message.id, "Duplicate delivery ignored");
            return false;
        }

        // Pushed messages hidden from this viewer are dropped outright, not
        // admitted-and-redacted, so they cannot be counted as seen.
        if source == DeliverySource::Push
            && !message.is_authored_by(viewer)
            && message.hidden_from_recipient()
        {
            debug!(message_id = %message.id, "Dropped hidden pushed message");
            return false;
        }

        self.admitted.insert(message.id);
        self.messages.push(message);
        true
    }

    /// Messages in admission order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of admitted messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the timeline holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Timelines for every open conversation, keyed by conversation ID.
///
/// Shared across the push task and the API callers, so the map lives behind
/// an async Mutex.
#[derive(Clone)]
pub struct DeliverySync {
    timelines: Arc<Mutex<HashMap<Uuid, ConversationTimeline>>>,
    viewer: Uuid,
}

impl DeliverySync {
    /// Create a synchronizer for a viewer.
    #[must_use]
    pub fn new(viewer: Uuid) -> Self {
        Self {
            timelines: Arc::new(Mutex::new(HashMap::new())),
            viewer,
        }
    }

    /// Ensure a timeline exists for a conversation.
    pub async fn open(&self, conversation_id: Uuid) {
        self.timelines
            .lock()
            .await
            .entry(conversation_id)
            .or_default();
    }

    /// Drop a conversation's timeline. Deliveries arriving afterwards for
    /// this conversation are discarded by `admit`.
    pub async fn close(&self, conversation_id: Uuid) {
        self.timelines.lock().await.remove(&conversation_id);
    }

    /// Admit one delivery into its conversation's timeline.
    ///
    /// Returns `false` when the conversation is not open, or when the
    /// timeline rejected the message (duplicate or push-filtered).
    pub async fn admit(
        &self,
        conversation_id: Uuid,
        message: Message,
        source: DeliverySource,
    ) -> bool {
        let mut timelines = self.timelines.lock().await;
        let Some(timeline) = timelines.get_mut(&conversation_id) else {
            trace!(%conversation_id, "Delivery for closed conversation discarded");
            return false;
        };
        timeline.admit(message, source, self.viewer)
    }

    /// A snapshot of the current timeline, in admission order.
    pub async fn snapshot(&self, conversation_id: Uuid) -> Vec<Message> {
        self.timelines
            .lock()
            .await
            .get(&conversation_id)
            .map(|t| t.messages().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use el_common::UserProfile;

    use super::*;

    fn message(id: Uuid, sender: Uuid, hidden: Option<bool>) -> Message {
        Message {
            id,
            sender: UserProfile {
                id: sender,
                name: "sender".into(),
                avatar_url: None,
                public_key: None,
            },
            content: Some("hi".into()),
            attachments: Vec::new(),
            created_at: chrono::Utc::now(),
            is_encrypted: false,
            encrypted_keys: None,
            is_visible_to_recipient: hidden.map(|h| !h),
        }
    }

    #[tokio::test]
    async fn test_admission_is_idempotent_across_sources() {
        let viewer = Uuid::new_v4();
        let sync = DeliverySync::new(viewer);
        let conv = Uuid::new_v4();
        sync.open(conv).await;

        let msg = message(Uuid::new_v4(), Uuid::new_v4(), None);
        assert!(sync.admit(conv, msg.clone(), DeliverySource::Push).await);
        assert!(!sync.admit(conv, msg.clone(), DeliverySource::Fetch).await);
        assert!(!sync.admit(conv, msg, DeliverySource::Push).await);
        assert_eq!(sync.snapshot(conv).await.len(), 1);
    }

    #[tokio::test]
    async fn test_first_admission_fixes_order() {
        let viewer = Uuid::new_v4();
        let sync = DeliverySync::new(viewer);
        let conv = Uuid::new_v4();
        sync.open(conv).await;

        let a = message(Uuid::new_v4(), viewer, None);
        let b = message(Uuid::new_v4(), viewer, None);
        sync.admit(conv, b.clone(), DeliverySource::Push).await;
        sync.admit(conv, a.clone(), DeliverySource::Fetch).await;
        // Re-delivery does not reorder.
        sync.admit(conv, b.clone(), DeliverySource::Fetch).await;

        let order: Vec<Uuid> = sync.snapshot(conv).await.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_push_drops_hidden_message_from_peer() {
        let viewer = Uuid::new_v4();
        let peer = Uuid::new_v4();
        let sync = DeliverySync::new(viewer);
        let conv = Uuid::new_v4();
        sync.open(conv).await;

        let hidden = message(Uuid::new_v4(), peer, Some(true));
        assert!(!sync.admit(conv, hidden.clone(), DeliverySource::Push).await);
        assert!(sync.snapshot(conv).await.is_empty());

        // The same message fetched later is admitted (render redacts it).
        assert!(sync.admit(conv, hidden, DeliverySource::Fetch).await);
        assert_eq!(sync.snapshot(conv).await.len(), 1);
    }

    #[tokio::test]
    async fn test_push_keeps_own_hidden_message() {
        let viewer = Uuid::new_v4();
        let sync = DeliverySync::new(viewer);
        let conv = Uuid::new_v4();
        sync.open(conv).await;

        let own_hidden = message(Uuid::new_v4(), viewer, Some(true));
        assert!(sync.admit(conv, own_hidden, DeliverySource::Push).await);
    }

    #[tokio::test]
    async fn test_closed_conversation_discards_deliveries() {
        let viewer = Uuid::new_v4();
        let sync = DeliverySync::new(viewer);
        let conv = Uuid::new_v4();
        sync.open(conv).await;
        sync.close(conv).await;

        let msg = message(Uuid::new_v4(), viewer, None);
        assert!(!sync.admit(conv, msg, DeliverySource::Push).await);
        assert!(sync.snapshot(conv).await.is_empty());
    }
}
