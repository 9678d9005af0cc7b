//! Visibility Gate
//!
//! Tutoring-policy filter applied to message content before any
//! cryptography. A message flagged invisible to recipients (typically one
//! that mentions an unconfirmed appointment) shows its real content only to
//! its sender; every other viewer gets a policy placeholder, even when they
//! hold a wrapped key that would decrypt it.

use el_common::{Attachment, Message};
use el_crypto::{decrypt_message, DecryptError, KeyPair};
use tracing::debug;
use uuid::Uuid;

/// What a viewer should be shown in place of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedContent {
    /// Unencrypted content, shown as-is.
    Plaintext(String),
    /// Encrypted content the viewer successfully decrypted.
    Decrypted(String),
    /// Content withheld by the visibility policy.
    PendingAppointment,
    /// Encrypted, but the viewer has no key pair at all.
    KeysUninitialized,
    /// Encrypted, but no wrapped key is addressed to the viewer.
    KeyMissing,
    /// Encrypted and addressed to the viewer, but decryption failed.
    Undecryptable,
}

impl RenderedContent {
    /// The text to display for this outcome.
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Plaintext(text) | Self::Decrypted(text) => text,
            Self::PendingAppointment => {
                "This message will be visible once the appointment is confirmed"
            }
            Self::KeysUninitialized => "[Encrypted message - initialize your keys to read]",
            Self::KeyMissing => "[Encrypted message - no key available]",
            Self::Undecryptable => "[Unable to decrypt message]",
        }
    }
}

/// Whether `viewer` may see the real content of `message`.
///
/// The sender always sees their own message; for everyone else an explicit
/// `is_visible_to_recipient == false` hides it. Absence of the flag means
/// visible.
#[must_use]
pub fn is_content_visible(message: &Message, viewer: Uuid) -> bool {
    message.is_authored_by(viewer) || !message.hidden_from_recipient()
}

/// The attachments `viewer` may see. Attachments ride with the content:
/// a gated body hides its attachments too.
#[must_use]
pub fn visible_attachments(message: &Message, viewer: Uuid) -> &[Attachment] {
    if is_content_visible(message, viewer) {
        &message.attachments
    } else {
        &[]
    }
}

/// Resolve the content a viewer should be shown.
///
/// The visibility gate runs first; cryptography is only attempted for
/// content the viewer is entitled to. Decryption failures degrade to
/// placeholders rather than errors so one bad message never breaks a
/// timeline render.
#[must_use]
pub fn render_content(message: &Message, viewer: Uuid, keys: Option<&KeyPair>) -> RenderedContent {
    if !is_content_visible(message, viewer) {
        return RenderedContent::PendingAppointment;
    }

    let content = message.content.as_deref().unwrap_or_default();
    if !message.is_encrypted {
        return RenderedContent::Plaintext(content.to_string());
    }

    let Some(keys) = keys else {
        return RenderedContent::KeysUninitialized;
    };

    let wrapped = message.wrapped_key_for(viewer);
    match decrypt_message(content, wrapped, &keys.private_key) {
        Ok(plaintext) => RenderedContent::Decrypted(plaintext),
        Err(DecryptError::MissingWrappedKey) => RenderedContent::KeyMissing,
        Err(e) => {
            debug!(message_id = %message.id, "Decryption failed: {e}");
            RenderedContent::Undecryptable
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use el_common::UserProfile;
    use el_crypto::{encrypt_message, generate_key_pair};

    use super::*;

    fn message_from(sender: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender: UserProfile {
                id: sender,
                name: "sender".into(),
                avatar_url: None,
                public_key: None,
            },
            content: Some("see you at 3pm".into()),
            attachments: vec![Attachment {
                id: Uuid::new_v4(),
                file_url: "https://files.example/a.pdf".into(),
                file_name: "a.pdf".into(),
                file_type: "application/pdf".into(),
                file_size: 1024,
            }],
            created_at: chrono::Utc::now(),
            is_encrypted: false,
            encrypted_keys: None,
            is_visible_to_recipient: None,
        }
    }

    #[test]
    fn test_sender_always_sees_hidden_message() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut msg = message_from(sender);
        msg.is_visible_to_recipient = Some(false);

        assert!(is_content_visible(&msg, sender));
        assert!(!is_content_visible(&msg, recipient));
        assert_eq!(
            render_content(&msg, recipient, None),
            RenderedContent::PendingAppointment
        );
        assert_eq!(
            render_content(&msg, sender, None),
            RenderedContent::Plaintext("see you at 3pm".into())
        );
    }

    #[test]
    fn test_absent_flag_means_visible() {
        let msg = message_from(Uuid::new_v4());
        assert!(is_content_visible(&msg, Uuid::new_v4()));
    }

    #[test]
    fn test_gated_attachments_are_hidden_with_content() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut msg = message_from(sender);
        msg.is_visible_to_recipient = Some(false);

        assert_eq!(visible_attachments(&msg, sender).len(), 1);
        assert!(visible_attachments(&msg, recipient).is_empty());
    }

    #[test]
    fn test_gate_outranks_decryptability() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let keys = generate_key_pair().unwrap();

        let (envelope, wrapped) = encrypt_message(
            "secret appointment detail",
            &[(recipient, keys.public_key.clone())],
        )
        .unwrap();

        let mut msg = message_from(sender);
        msg.content = Some(envelope.to_hex());
        msg.is_encrypted = true;
        msg.encrypted_keys = Some(wrapped);
        msg.is_visible_to_recipient = Some(false);

        // The recipient holds a working wrapped key yet still gets the
        // policy placeholder.
        assert_eq!(
            render_content(&msg, recipient, Some(&keys)),
            RenderedContent::PendingAppointment
        );
    }

    #[test]
    fn test_encrypted_render_outcomes() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let keys = generate_key_pair().unwrap();

        let (envelope, wrapped) =
            encrypt_message("hello", &[(recipient, keys.public_key.clone())]).unwrap();

        let mut msg = message_from(sender);
        msg.content = Some(envelope.to_hex());
        msg.is_encrypted = true;
        msg.encrypted_keys = Some(wrapped);

        assert_eq!(
            render_content(&msg, recipient, Some(&keys)),
            RenderedContent::Decrypted("hello".into())
        );
        assert_eq!(
            render_content(&msg, recipient, None),
            RenderedContent::KeysUninitialized
        );
        assert_eq!(
            render_content(&msg, stranger, Some(&keys)),
            RenderedContent::KeyMissing
        );
    }

    #[test]
    fn test_wrong_keys_degrade_to_undecryptable() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let real = generate_key_pair().unwrap();
        let wrong = generate_key_pair().unwrap();

        let (envelope, wrapped) =
            encrypt_message("hello", &[(recipient, real.public_key.clone())]).unwrap();

        let mut msg = message_from(sender);
        msg.content = Some(envelope.to_hex());
        msg.is_encrypted = true;
        msg.encrypted_keys = Some(wrapped);

        assert_eq!(
            render_content(&msg, recipient, Some(&wrong)),
            RenderedContent::Undecryptable
        );
    }

    #[test]
    fn test_encrypted_without_key_table() {
        let sender = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let keys = generate_key_pair().unwrap();

        let mut msg = message_from(sender);
        msg.content = Some("00".repeat(32));
        msg.is_encrypted = true;
        msg.encrypted_keys = Some(HashMap::new());

        assert_eq!(
            render_content(&msg, viewer, Some(&keys)),
            RenderedContent::KeyMissing
        );
    }
}
