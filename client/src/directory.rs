//! Key Directory
//!
//! Resolves participant identities to their published public keys, backed by
//! the remote profile registry. A user without a published key is a normal,
//! expected state (`PeerKeyStatus::Unknown`), never an error.
//!
//! The same registry also holds the local user's own backed-up key pair so
//! a fresh session can recover keys before generating new ones.

use async_trait::async_trait;
use el_crypto::KeyPair;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::ClientConfig;

/// Whether a peer has a published encryption key.
///
/// An explicit sum type so capability decisions are exhaustive instead of
/// leaning on empty-string or null checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerKeyStatus {
    /// The peer has published this public key (PEM).
    Known(String),
    /// The peer has not published a key.
    Unknown,
}

/// Directory errors. Key absence is *not* an error; these cover transport
/// and protocol failures only.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Transport failure.
    #[error("Profile registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Registry answered with a non-success status.
    #[error("Profile registry returned {status} for {context}")]
    Status {
        status: reqwest::StatusCode,
        context: String,
    },
}

/// Directory result type.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Lookup of published public keys and backup of the local user's own pair.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// The published public key of a participant, if any.
    async fn public_key_of(&self, user_id: Uuid) -> Result<PeerKeyStatus>;

    /// The local user's own backed-up key pair from their remote profile.
    async fn own_keys(&self) -> Result<Option<KeyPair>>;

    /// Back up the local user's keys to their remote profile. The private
    /// key is sent as stored for cross-session retrieval by the same
    /// authenticated user; further protection is the registry's concern.
    async fn backup_keys(&self, public_key: &str, encrypted_private_key: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    encrypted_private_key: Option<String>,
}

/// HTTP adapter against the platform's profile registry.
pub struct HttpKeyDirectory {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpKeyDirectory {
    /// Create a directory using the given HTTP client and configuration.
    #[must_use]
    pub fn new(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.access_token)
    }
}

#[async_trait]
impl KeyDirectory for HttpKeyDirectory {
    async fn public_key_of(&self, user_id: Uuid) -> Result<PeerKeyStatus> {
        let url = self.config.api_url(&format!("users/{user_id}/profile/"));
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::Status {
                status: response.status(),
                context: format!("profile of {user_id}"),
            });
        }

        let profile: ProfileResponse = response.json().await?;
        let status = match profile.public_key.filter(|k| !k.is_empty()) {
            Some(key) => PeerKeyStatus::Known(key),
            None => PeerKeyStatus::Unknown,
        };
        debug!(%user_id, known = matches!(status, PeerKeyStatus::Known(_)), "Resolved peer key");
        Ok(status)
    }

    async fn own_keys(&self) -> Result<Option<KeyPair>> {
        let url = self.config.api_url("auth/profile/");
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::Status {
                status: response.status(),
                context: "own profile".to_string(),
            });
        }

        let profile: ProfileResponse = response.json().await?;
        match (profile.public_key, profile.encrypted_private_key) {
            (Some(public_key), Some(private_key))
                if !public_key.is_empty() && !private_key.is_empty() =>
            {
                Ok(Some(KeyPair {
                    public_key,
                    private_key,
                }))
            }
            _ => Ok(None),
        }
    }

    async fn backup_keys(&self, public_key: &str, encrypted_private_key: &str) -> Result<()> {
        let url = self.config.api_url("auth/profile/");
        let response = self
            .http
            .patch(&url)
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({
                "public_key": public_key,
                "encrypted_private_key": encrypted_private_key,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::Status {
                status: response.status(),
                context: "key backup".to_string(),
            });
        }
        Ok(())
    }
}
