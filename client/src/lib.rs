//! `EduLab` Messaging Client Library
//!
//! End-to-end encrypted messaging core for the tutoring platform: key
//! management, per-send encryption negotiation, hybrid RSA/AES encryption,
//! the appointment visibility gate, and push/fetch delivery merging.

pub mod api;
pub mod client;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod negotiator;
pub mod network;
pub mod sync;
pub mod visibility;

pub use api::{MessagingApi, OutgoingMessage, SendReceipt};
pub use client::{ClientError, MessagingClient, SendOutcome};
pub use config::ClientConfig;
pub use crypto::KeyManager;
pub use directory::{HttpKeyDirectory, KeyDirectory, PeerKeyStatus};
pub use negotiator::{negotiate, Capability, Negotiation};
pub use network::{ConnectionStatus, PushChannel};
pub use sync::{ConversationTimeline, DeliverySource, DeliverySync};
pub use visibility::{is_content_visible, render_content, visible_attachments, RenderedContent};

/// Initialize logging for binaries and integration harnesses. Library code
/// only emits `tracing` events and never installs a subscriber itself.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "el_client=debug".into()),
        )
        .init();
}
