//! Encryption of license artifacts under a key derived from the device
//! fingerprint.
//!
//! The salt is fixed and public; the fingerprint supplies the secret input.
//! A blob encrypted on one machine does not decrypt on another, and
//! decryption failures of any kind surface as `None`, meaning "unreadable on
//! this device".

use crate::encryption::{decrypt_from_base64, derive_key, encrypt_to_base64, DerivedKey};
use crate::errors::KeywardResult;
use crate::fingerprint::Fingerprint;

/// Fixed PBKDF2 salt for device-bound keys.
pub const DEVICE_KEY_SALT: &[u8] = b"keyward-device-binding-v1";

/// Cipher holding the key derived from one fingerprint.
///
/// Key derivation costs 100,000 PBKDF2 rounds, so keep one instance around
/// instead of calling the free functions repeatedly.
pub struct DeviceBoundCipher {
    key: DerivedKey,
}

impl DeviceBoundCipher {
    pub fn new(fingerprint: &Fingerprint) -> Self {
        Self {
            key: Self::derive_key(fingerprint),
        }
    }

    /// Stretch the fingerprint into the AES-256 key.
    pub fn derive_key(fingerprint: &Fingerprint) -> DerivedKey {
        derive_key(fingerprint.as_bytes(), DEVICE_KEY_SALT)
    }

    /// Encrypt with a fresh nonce; the output is base64 of nonce || ciphertext+tag.
    pub fn encrypt(&self, plaintext: &[u8]) -> KeywardResult<String> {
        encrypt_to_base64(plaintext, self.key.as_slice())
    }

    /// Decrypt a blob, or `None` if it was not produced for this device or
    /// has been modified.
    pub fn decrypt(&self, blob: &str) -> Option<Vec<u8>> {
        match decrypt_from_base64(blob, self.key.as_slice()) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                tracing::debug!("device-bound blob unreadable: {e}");
                None
            }
        }
    }

    /// [`decrypt`](Self::decrypt) for UTF-8 payloads such as JSON.
    pub fn decrypt_string(&self, blob: &str) -> Option<String> {
        self.decrypt(blob).and_then(|bytes| String::from_utf8(bytes).ok())
    }
}

/// One-shot encryption under `fingerprint`.
pub fn encrypt(plaintext: &[u8], fingerprint: &Fingerprint) -> KeywardResult<String> {
    DeviceBoundCipher::new(fingerprint).encrypt(plaintext)
}

/// One-shot decryption under `fingerprint`.
pub fn decrypt(blob: &str, fingerprint: &Fingerprint) -> Option<Vec<u8>> {
    DeviceBoundCipher::new(fingerprint).decrypt(blob)
}
