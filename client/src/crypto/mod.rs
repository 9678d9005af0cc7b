//! Key Management
//!
//! Local key pair lifecycle: encrypted storage, lazy generation, and
//! recovery/backup against the remote profile registry.

pub mod manager;
pub mod store;

pub use manager::{KeyManager, KeyManagerError};
pub use store::{KeyStoreError, LocalKeyStore};
