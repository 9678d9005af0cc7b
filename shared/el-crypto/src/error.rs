//! Error Types

use thiserror::Error;
use uuid::Uuid;

/// Key pair generation failure.
///
/// Fatal for encryption this session; callers fall back to plaintext and
/// surface the failure to the user.
#[derive(Debug, Error)]
pub enum KeyGenError {
    /// The RSA key could not be generated (entropy or arithmetic failure).
    #[error("Key generation failed: {0}")]
    Generation(String),

    /// The generated key could not be encoded as PEM.
    #[error("Key encoding failed: {0}")]
    Encoding(String),
}

/// Message encryption failure.
#[derive(Debug, Error)]
pub enum EncryptError {
    /// A participant has no usable public key.
    ///
    /// Callers are expected to have checked capability via the negotiator
    /// first; hitting this is a defensive re-check, not the normal path.
    #[error("Encryption unavailable: no usable public key for participant {participant}")]
    EncryptionUnavailable { participant: Uuid },

    /// Wrapping the symmetric key for a participant failed.
    #[error("Failed to wrap message key for participant {participant}: {reason}")]
    KeyWrap { participant: Uuid, reason: String },

    /// The participant set was empty (a message must at least address its
    /// sender so they can re-read it).
    #[error("Cannot encrypt for an empty participant set")]
    NoParticipants,

    /// The system randomness source failed.
    #[error("Randomness source failed: {0}")]
    Random(String),
}

/// Message decryption failure.
///
/// Every kind is recoverable per-message: the caller renders a placeholder
/// for the affected message and the rest of the timeline is untouched. The
/// kinds are stable so the UI can distinguish "key missing" from
/// "undecryptable".
#[derive(Debug, Error)]
pub enum DecryptError {
    /// The wrapped-key map has no entry for this viewer.
    #[error("No wrapped key for this viewer")]
    MissingWrappedKey,

    /// The envelope is not valid `hex(iv || ciphertext)`.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The viewer's private key could not be parsed.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The wrapped symmetric key could not be unwrapped (wrong key pair or
    /// corrupted wrap).
    #[error("Failed to unwrap message key: {0}")]
    KeyUnwrap(String),

    /// The content could not be decrypted with the unwrapped key (corrupted
    /// ciphertext or padding).
    #[error("Failed to decrypt content: {0}")]
    Ciphertext(String),
}
