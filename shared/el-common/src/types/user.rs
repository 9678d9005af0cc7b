//! User Types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile of a conversation participant.
///
/// `public_key` is the participant's published encryption key (SPKI PEM).
/// Its absence is a normal state — the user simply has not initialized
/// encryption yet — never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Published RSA public key (PEM), if the user has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}
