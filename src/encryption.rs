//! Symmetric primitives shared by the device-bound cipher and the vault.
//!
//! AES-256-GCM with a fresh 96-bit nonce per call, and PBKDF2-HMAC-SHA256
//! key stretching.

use std::num::NonZeroU32;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;
use ring::pbkdf2;
use zeroize::Zeroizing;

use crate::errors::{KeywardError, KeywardResult};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// PBKDF2 iteration count for every derived key.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// A derived AES key, wiped when dropped.
pub type DerivedKey = Zeroizing<[u8; KEY_SIZE]>;

/// Fill a buffer from the OS RNG.
///
/// Panics if the OS RNG is unavailable.
pub fn random_bytes(buf: &mut [u8]) {
    OsRng
        .try_fill_bytes(buf)
        .expect("OsRng failed to generate random bytes");
}

/// Stretch `secret` with PBKDF2-HMAC-SHA256 into an AES-256 key.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> DerivedKey {
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN);
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        secret,
        &mut key[..],
    );
    key
}

/// Encrypt arbitrary bytes using AES-256-GCM.
///
/// Output format:
///   [nonce (12 bytes)] || [ciphertext+tag]
pub fn encrypt_bytes(plaintext: &[u8], key: &[u8]) -> KeywardResult<Vec<u8>> {
    if key.len() != KEY_SIZE {
        return Err(KeywardError::EncryptionError(format!(
            "invalid key length: expected {} bytes, got {}",
            KEY_SIZE,
            key.len()
        )));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    random_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| KeywardError::EncryptionError(format!("encryption failed: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.append(&mut ciphertext);

    Ok(output)
}

/// Decrypt bytes produced by `encrypt_bytes`.
pub fn decrypt_bytes(ciphertext: &[u8], key: &[u8]) -> KeywardResult<Vec<u8>> {
    if key.len() != KEY_SIZE {
        return Err(KeywardError::DecryptionError(format!(
            "invalid key length: expected {} bytes, got {}",
            KEY_SIZE,
            key.len()
        )));
    }

    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(KeywardError::DecryptionError(
            "ciphertext too short".to_string(),
        ));
    }

    let (nonce_bytes, ct) = ciphertext.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(nonce, ct)
        .map_err(|e| KeywardError::DecryptionError(format!("decryption failed: {e}")))
}

/// Encrypt bytes and return a Base64 string.
pub fn encrypt_to_base64(plaintext: &[u8], key: &[u8]) -> KeywardResult<String> {
    let encrypted = encrypt_bytes(plaintext, key)?;
    Ok(B64.encode(encrypted))
}

/// Decrypt a Base64 ciphertext previously produced by `encrypt_to_base64`.
pub fn decrypt_from_base64(ciphertext_b64: &str, key: &[u8]) -> KeywardResult<Vec<u8>> {
    let decoded = B64
        .decode(ciphertext_b64.trim())
        .map_err(|e| KeywardError::DecryptionError(format!("base64 decode failed: {e}")))?;
    decrypt_bytes(&decoded, key)
}
