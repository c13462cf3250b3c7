//! Encryption of task and comment bodies.
//!
//! AES-256-GCM with a random 12-byte nonce. The output layout is
//! `nonce || ciphertext+tag`, which is what the contract stores in the
//! `ciphertext` argument of `create_task` and `add_comment`. Keys travel as
//! standard base64 of the raw 32 bytes.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

/// Errors from payload encryption.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// The exported key is not valid base64.
    #[error("key is not valid base64: {0}")]
    KeyEncoding(String),

    /// The key does not have 32 bytes.
    #[error("key must be {KEY_LEN} bytes, got {0}")]
    KeyLength(usize),

    /// The payload is too short to hold a nonce.
    #[error("payload too short ({0} bytes)")]
    Truncated(usize),

    /// Encryption failed.
    #[error("encryption failed")]
    Encrypt,

    /// Wrong key or tampered payload.
    #[error("decryption failed")]
    Decrypt,

    /// Decrypted bytes are not UTF-8.
    #[error("decrypted payload is not UTF-8")]
    NotUtf8,
}

/// A symmetric key for task payloads.
#[derive(Clone, PartialEq, Eq)]
pub struct PayloadKey([u8; KEY_LEN]);

impl std::fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadKey(..)")
    }
}

impl PayloadKey {
    /// A fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Base64 of the raw key bytes.
    #[must_use]
    pub fn export(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Parses a key produced by [`PayloadKey::export`].
    ///
    /// # Errors
    ///
    /// Returns an error if `encoded` is not base64 or not 32 bytes long.
    pub fn import(encoded: &str) -> Result<Self, CryptoError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::KeyLength(raw.len()))?;
        Ok(Self(bytes))
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|_| CryptoError::KeyLength(self.0.len()))
    }

    /// Encrypts `plaintext` into `nonce || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encrypt`] if the cipher fails.
    pub fn encrypt_text(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher()?
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypts a payload produced by [`PayloadKey::encrypt_text`].
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is truncated, the key is wrong, the
    /// payload was altered, or the plaintext is not UTF-8.
    pub fn decrypt_text(&self, payload: &[u8]) -> Result<String, CryptoError> {
        if payload.len() < NONCE_LEN {
            return Err(CryptoError::Truncated(payload.len()));
        }
        let (nonce, sealed) = payload.split_at(NONCE_LEN);
        let plain = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plain).map_err(|_| CryptoError::NotUtf8)
    }
}
