//! `EduLab` Hybrid Message Cryptography
//!
//! Stateless engine for end-to-end encrypted messages:
//!
//! - **Content**: AES-256-CBC with a fresh key and IV per message
//! - **Key wrapping**: the symmetric key is wrapped per recipient with
//!   RSA-OAEP under their published public key
//!
//! The transport encoding of an encrypted body is `hex(iv || ciphertext)`
//! and wrapped keys are hex strings, so envelopes produced by older client
//! builds remain readable.

pub mod error;
pub mod hybrid;
pub mod keys;

pub use error::{DecryptError, EncryptError, KeyGenError};
pub use hybrid::{decrypt_message, encrypt_message, Envelope, WrappedKeyMap};
pub use keys::{generate_key_pair, KeyPair, RSA_MODULUS_BITS};
