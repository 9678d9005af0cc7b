//! Key Manager
//!
//! High-level API for the local user's key pair: synchronous lookups once a
//! pair exists, lazy discovery-or-generation on first use.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use el_crypto::KeyPair;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::store::{KeyStoreMetadata, LocalKeyStore};
use crate::directory::KeyDirectory;

/// Key manager errors.
#[derive(Debug, Error)]
pub enum KeyManagerError {
    /// Key store error.
    #[error("Key store error: {0}")]
    KeyStore(#[from] super::store::KeyStoreError),

    /// Key generation failed — fatal for encryption this session; callers
    /// offer plaintext fallback and surface the failure.
    #[error("Key generation failed: {0}")]
    Generation(String),
}

/// Key manager result type.
pub type Result<T> = std::result::Result<T, KeyManagerError>;

/// Manages the local user's RSA key pair.
///
/// Uses `Mutex` instead of `RwLock` because `rusqlite::Connection` is `Send`
/// but not `Sync`. The lock is never held across an await point.
pub struct KeyManager {
    store: Arc<Mutex<LocalKeyStore>>,
    user_id: Uuid,
}

impl KeyManager {
    /// Open (or create) the key store for a user.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory for the key database
    /// * `user_id` - The authenticated user's ID
    /// * `encryption_key` - 32-byte key encrypting the store at rest
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn init(data_dir: PathBuf, user_id: Uuid, encryption_key: [u8; 32]) -> Result<Self> {
        let db_path = data_dir.join("keys.db");
        let store = LocalKeyStore::open(&db_path, encryption_key)?;

        if store.load_metadata()?.is_none() {
            store.save_metadata(&KeyStoreMetadata {
                user_id,
                created_at: chrono::Utc::now().timestamp(),
            })?;
        }

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            user_id,
        })
    }

    /// The owning user's ID.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Whether a key pair exists locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    ///
    /// # Panics
    ///
    /// Panics if the Mutex is poisoned.
    pub fn has_key_pair(&self) -> Result<bool> {
        let store = self.store.lock().expect("Mutex poisoned");
        Ok(store.has_key_pair()?)
    }

    /// The locally stored key pair, if any. Synchronous — no discovery or
    /// generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or at-rest decryption fails.
    ///
    /// # Panics
    ///
    /// Panics if the Mutex is poisoned.
    pub fn key_pair(&self) -> Result<Option<KeyPair>> {
        let store = self.store.lock().expect("Mutex poisoned");
        Ok(store.load_key_pair()?)
    }

    /// The local public key PEM, if a pair exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn public_key(&self) -> Result<Option<String>> {
        Ok(self.key_pair()?.map(|pair| pair.public_key.clone()))
    }

    /// Get the local key pair, discovering or generating one if needed.
    ///
    /// Resolution order:
    ///
    /// 1. local store (synchronous hit — the common case after first use);
    /// 2. the user's own remote profile backup (another session may have
    ///    generated keys already);
    /// 3. fresh generation on a blocking worker, persisted locally, then
    ///    backed up to the remote profile best-effort — a failed backup is
    ///    logged and does not block local usability.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or generation itself fails.
    pub async fn get_or_create_key_pair(&self, directory: &dyn KeyDirectory) -> Result<KeyPair> {
        if let Some(pair) = self.key_pair()? {
            return Ok(pair);
        }

        match directory.own_keys().await {
            Ok(Some(pair)) => {
                info!("Recovered key pair from remote profile");
                let store = self.store.lock().expect("Mutex poisoned");
                store.save_key_pair(&pair)?;
                return Ok(pair);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Key recovery from remote profile failed: {e}");
            }
        }

        let pair = self.generate_and_persist().await?;

        if let Err(e) = directory
            .backup_keys(&pair.public_key, &pair.private_key)
            .await
        {
            warn!("Key backup to remote profile failed: {e}");
        }

        Ok(pair)
    }

    /// Replace the local key pair with a freshly generated one.
    ///
    /// Every wrapped key addressed to the old public key becomes
    /// undecryptable; no retroactive re-wrap is performed.
    ///
    /// # Errors
    ///
    /// Returns an error if generation or persistence fails.
    pub async fn regenerate_key_pair(&self, directory: &dyn KeyDirectory) -> Result<KeyPair> {
        let pair = tokio::task::spawn_blocking(el_crypto::generate_key_pair)
            .await
            .map_err(|e| KeyManagerError::Generation(format!("generation task failed: {e}")))?
            .map_err(|e| KeyManagerError::Generation(e.to_string()))?;

        {
            let store = self.store.lock().expect("Mutex poisoned");
            store.save_key_pair(&pair)?;
        }
        info!("Regenerated local key pair");

        if let Err(e) = directory
            .backup_keys(&pair.public_key, &pair.private_key)
            .await
        {
            warn!("Key backup to remote profile failed: {e}");
        }

        Ok(pair)
    }

    /// Generate a pair off the async threads and persist it.
    async fn generate_and_persist(&self) -> Result<KeyPair> {
        let pair = tokio::task::spawn_blocking(el_crypto::generate_key_pair)
            .await
            .map_err(|e| KeyManagerError::Generation(format!("generation task failed: {e}")))?
            .map_err(|e| KeyManagerError::Generation(e.to_string()))?;

        let store = self.store.lock().expect("Mutex poisoned");
        // Another task may have won the race while we were generating.
        if let Some(existing) = store.load_key_pair()? {
            return Ok(existing);
        }
        store.save_key_pair(&pair)?;
        info!("Generated new local key pair");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::directory::testing::StaticDirectory;

    #[tokio::test]
    async fn test_manager_generates_persists_and_backs_up() {
        let dir = tempdir().unwrap();
        let manager =
            KeyManager::init(dir.path().to_path_buf(), Uuid::new_v4(), [0u8; 32]).unwrap();
        let directory = StaticDirectory::default();

        assert!(!manager.has_key_pair().unwrap());

        let pair = manager.get_or_create_key_pair(&directory).await.unwrap();
        assert!(pair.public_key.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(manager.has_key_pair().unwrap());

        let backups = directory.backups.lock().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].0, pair.public_key);
    }

    #[tokio::test]
    async fn test_manager_second_call_is_a_lookup() {
        let dir = tempdir().unwrap();
        let manager =
            KeyManager::init(dir.path().to_path_buf(), Uuid::new_v4(), [0u8; 32]).unwrap();
        let directory = StaticDirectory::default();

        let first = manager.get_or_create_key_pair(&directory).await.unwrap();
        let second = manager.get_or_create_key_pair(&directory).await.unwrap();

        assert_eq!(first.public_key, second.public_key);
        assert_eq!(first.private_key, second.private_key);
        // No second backup for a lookup.
        assert_eq!(directory.backups.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manager_recovers_from_remote_profile() {
        let dir = tempdir().unwrap();
        let manager =
            KeyManager::init(dir.path().to_path_buf(), Uuid::new_v4(), [0u8; 32]).unwrap();

        let directory = StaticDirectory::default();
        let remote = el_crypto::generate_key_pair().unwrap();
        directory.set_own(remote.clone());

        let pair = manager.get_or_create_key_pair(&directory).await.unwrap();
        assert_eq!(pair.public_key, remote.public_key);
        // Recovery must not push a fresh backup.
        assert!(directory.backups.lock().unwrap().is_empty());
        // And the recovered pair is now a local hit.
        assert!(manager.has_key_pair().unwrap());
    }

    #[tokio::test]
    async fn test_manager_regenerate_replaces_pair() {
        let dir = tempdir().unwrap();
        let manager =
            KeyManager::init(dir.path().to_path_buf(), Uuid::new_v4(), [0u8; 32]).unwrap();
        let directory = StaticDirectory::default();

        let old = manager.get_or_create_key_pair(&directory).await.unwrap();
        let new = manager.regenerate_key_pair(&directory).await.unwrap();

        assert_ne!(old.public_key, new.public_key);
        let current = manager.key_pair().unwrap().unwrap();
        assert_eq!(current.public_key, new.public_key);
        assert_eq!(directory.backups.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_manager_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let user_id = Uuid::new_v4();
        let directory = StaticDirectory::default();

        let public_key;
        {
            let manager =
                KeyManager::init(dir.path().to_path_buf(), user_id, [0u8; 32]).unwrap();
            public_key = manager
                .get_or_create_key_pair(&directory)
                .await
                .unwrap()
                .public_key
                .clone();
        }

        {
            let manager =
                KeyManager::init(dir.path().to_path_buf(), user_id, [0u8; 32]).unwrap();
            let pair = manager.get_or_create_key_pair(&directory).await.unwrap();
            assert_eq!(pair.public_key, public_key);
        }
    }
}
