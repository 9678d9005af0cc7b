//! Hybrid Message Encryption
//!
//! One fresh AES-256 key and 16-byte IV per message; the key is wrapped with
//! RSA-OAEP for every participant of the conversation, sender included, so
//! the sender can re-read their own messages later.

use std::collections::HashMap;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rsa::Oaep;
use sha1::Sha1;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{DecryptError, EncryptError};
use crate::keys;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES key length in bytes (256 bits).
const AES_KEY_LEN: usize = 32;
/// CBC initialization vector length in bytes.
const IV_LEN: usize = 16;
/// AES block length in bytes.
const BLOCK_LEN: usize = 16;

/// Wrapped symmetric keys, one hex string per participant.
pub type WrappedKeyMap = HashMap<Uuid, String>;

/// An encrypted message body: IV plus ciphertext.
///
/// Transport encoding is `hex(iv || ciphertext)` — exactly 16 raw bytes of
/// IV followed by the ciphertext, no separator, no length prefix. This
/// layout must not change: persisted envelopes depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// CBC initialization vector.
    pub iv: [u8; IV_LEN],
    /// AES-256-CBC ciphertext (PKCS#7 padded).
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode for transport.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut raw = Vec::with_capacity(IV_LEN + self.ciphertext.len());
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.ciphertext);
        hex::encode(raw)
    }

    /// Decode a transport envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError::MalformedEnvelope`] for non-hex input, input
    /// shorter than one IV plus one cipher block, or a ciphertext that is
    /// not block-aligned.
    pub fn from_hex(encoded: &str) -> Result<Self, DecryptError> {
        let raw = hex::decode(encoded)
            .map_err(|e| DecryptError::MalformedEnvelope(format!("invalid hex: {e}")))?;

        if raw.len() < IV_LEN + BLOCK_LEN {
            return Err(DecryptError::MalformedEnvelope(format!(
                "envelope too short: {} bytes",
                raw.len()
            )));
        }

        let (iv_bytes, ciphertext) = raw.split_at(IV_LEN);
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(DecryptError::MalformedEnvelope(format!(
                "ciphertext not block aligned: {} bytes",
                ciphertext.len()
            )));
        }

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);
        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt a message body for a set of participants.
///
/// Generates a fresh symmetric key and IV (never reused across messages),
/// encrypts the plaintext, and wraps the key for every participant. The
/// returned map has exactly one entry per participant.
///
/// # Errors
///
/// - [`EncryptError::NoParticipants`] for an empty participant set
/// - [`EncryptError::EncryptionUnavailable`] if a participant's public key
///   does not parse (callers should have checked capability already)
/// - [`EncryptError::KeyWrap`] / [`EncryptError::Random`] on RSA or entropy
///   failure
pub fn encrypt_message(
    plaintext: &str,
    participants: &[(Uuid, String)],
) -> Result<(Envelope, WrappedKeyMap), EncryptError> {
    if participants.is_empty() {
        return Err(EncryptError::NoParticipants);
    }

    let mut key = Zeroizing::new([0u8; AES_KEY_LEN]);
    getrandom::getrandom(key.as_mut())
        .map_err(|e| EncryptError::Random(format!("key generation: {e}")))?;

    let mut iv = [0u8; IV_LEN];
    getrandom::getrandom(&mut iv)
        .map_err(|e| EncryptError::Random(format!("iv generation: {e}")))?;

    let ciphertext = Aes256CbcEnc::new((&*key).into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut rng = rand::thread_rng();
    let mut wrapped_keys = WrappedKeyMap::with_capacity(participants.len());
    for (participant, public_key_pem) in participants {
        let public_key = keys::public_key_from_pem(*participant, public_key_pem)?;
        let wrapped = public_key
            .encrypt(&mut rng, Oaep::new::<Sha1>(), key.as_ref())
            .map_err(|e| EncryptError::KeyWrap {
                participant: *participant,
                reason: e.to_string(),
            })?;
        wrapped_keys.insert(*participant, hex::encode(wrapped));
    }

    Ok((Envelope { iv, ciphertext }, wrapped_keys))
}

/// Decrypt a message body with the viewer's wrapped key and private key.
///
/// `wrapped_key_hex` is the viewer's own entry from the message's
/// wrapped-key map; `None` means the map had no entry for them, which is a
/// hard decryption failure rendered as a "key missing" placeholder, never a
/// crash.
///
/// # Errors
///
/// Returns a [`DecryptError`] kind distinguishing missing key, malformed
/// envelope, unwrap failure (wrong key pair) and corrupt ciphertext.
pub fn decrypt_message(
    envelope_hex: &str,
    wrapped_key_hex: Option<&str>,
    private_key_pem: &str,
) -> Result<String, DecryptError> {
    let wrapped_key_hex = wrapped_key_hex.ok_or(DecryptError::MissingWrappedKey)?;
    let envelope = Envelope::from_hex(envelope_hex)?;

    let wrapped = hex::decode(wrapped_key_hex)
        .map_err(|e| DecryptError::KeyUnwrap(format!("invalid hex: {e}")))?;

    let private_key = keys::private_key_from_pem(private_key_pem)?;
    let key = Zeroizing::new(
        private_key
            .decrypt(Oaep::new::<Sha1>(), &wrapped)
            .map_err(|e| DecryptError::KeyUnwrap(e.to_string()))?,
    );

    if key.len() != AES_KEY_LEN {
        return Err(DecryptError::KeyUnwrap(format!(
            "unexpected key length: {} bytes",
            key.len()
        )));
    }

    let plaintext = Aes256CbcDec::new_from_slices(&key, &envelope.iv)
        .map_err(|e| DecryptError::KeyUnwrap(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(&envelope.ciphertext)
        .map_err(|e| DecryptError::Ciphertext(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| DecryptError::Ciphertext(e.to_string()))
}
