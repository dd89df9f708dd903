//! P-256 key material for license signatures.
//!
//! Private keys are PKCS#8 documents (hex encoded) that only the signing
//! service holds. Public keys are 65-byte uncompressed curve points (hex
//! encoded) compiled into client builds.

use std::fmt;

#[cfg(feature = "signer")]
use ring::rand::SystemRandom;
#[cfg(feature = "signer")]
use ring::signature::{EcdsaKeyPair, KeyPair as _, ECDSA_P256_SHA256_ASN1_SIGNING};
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1};
use zeroize::Zeroize;

use crate::errors::{KeywardError, KeywardResult};

/// Length of an uncompressed SEC1 P-256 point.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Message signed and verified when a new pair is generated.
#[cfg(feature = "signer")]
const SELF_TEST_MESSAGE: &[u8] = b"keyward key pair self-test";

/// Public key embedded at build time, if the build set one.
pub const EMBEDDED_PUBLIC_KEY: Option<&str> = option_env!("KEYWARD_EMBEDDED_PUBLIC_KEY");

/// A hex-encoded signing key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Hex PKCS#8 document.
    pub private_key: String,
    /// Hex uncompressed point.
    pub public_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Generate a P-256 key pair and prove it works before handing it out.
#[cfg(feature = "signer")]
pub fn generate_key_pair() -> KeywardResult<KeyPair> {
    let rng = SystemRandom::new();

    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
        .map_err(|_| KeywardError::InvalidKey("key generation failed".to_string()))?;
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
        .map_err(|e| KeywardError::InvalidKey(format!("generated key rejected: {e}")))?;

    self_test(&key_pair, &rng)?;

    tracing::info!("generated and self-tested new P-256 signing key pair");

    Ok(KeyPair {
        private_key: hex::encode(pkcs8.as_ref()),
        public_key: hex::encode(key_pair.public_key().as_ref()),
    })
}

#[cfg(feature = "signer")]
fn self_test(key_pair: &EcdsaKeyPair, rng: &SystemRandom) -> KeywardResult<()> {
    let signature = key_pair
        .sign(rng, SELF_TEST_MESSAGE)
        .map_err(|_| KeywardError::SelfTestFailed)?;

    UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, key_pair.public_key().as_ref())
        .verify(SELF_TEST_MESSAGE, signature.as_ref())
        .map_err(|_| {
            tracing::error!("generated key pair failed sign/verify self-test");
            KeywardError::SelfTestFailed
        })
}

/// Parse a hex PKCS#8 private key into a usable signing key.
#[cfg(feature = "signer")]
pub fn load_signing_key(private_key_hex: &str) -> KeywardResult<EcdsaKeyPair> {
    let mut der = hex::decode(private_key_hex.trim())
        .map_err(|e| KeywardError::InvalidKey(format!("private key is not hex: {e}")))?;

    let rng = SystemRandom::new();
    let result = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &der, &rng)
        .map_err(|e| KeywardError::InvalidKey(format!("private key rejected: {e}")));
    der.zeroize();
    result
}

/// Decode and shape-check a hex public key.
pub fn parse_public_key(public_key_hex: &str) -> KeywardResult<Vec<u8>> {
    let bytes = hex::decode(public_key_hex.trim())
        .map_err(|e| KeywardError::InvalidKey(format!("public key is not hex: {e}")))?;

    if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != 0x04 {
        return Err(KeywardError::InvalidKey(format!(
            "public key must be a {PUBLIC_KEY_LEN}-byte uncompressed point, got {} bytes",
            bytes.len()
        )));
    }

    Ok(bytes)
}

/// Verify an ASN.1 DER ECDSA P-256/SHA-256 signature.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, public_key)
        .verify(message, signature)
        .is_ok()
}

#[cfg(all(test, feature = "signer"))]
mod tests {
    use super::*;

    #[test]
    fn generated_public_key_is_uncompressed_point() {
        let pair = generate_key_pair().expect("generation should succeed");
        let public = parse_public_key(&pair.public_key).expect("public key should parse");

        assert_eq!(public.len(), PUBLIC_KEY_LEN);
        assert_eq!(pair.public_key.len(), PUBLIC_KEY_LEN * 2);
    }

    #[test]
    fn generated_private_key_loads() {
        let pair = generate_key_pair().unwrap();
        let key = load_signing_key(&pair.private_key).expect("private key should load");
        assert_eq!(hex::encode(key.public_key().as_ref()), pair.public_key);
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!(matches!(load_signing_key("zz"), Err(KeywardError::InvalidKey(_))));
        assert!(matches!(load_signing_key("00ff"), Err(KeywardError::InvalidKey(_))));
        assert!(parse_public_key("04abcd").is_err());
        assert!(parse_public_key(&"05".repeat(65)).is_err());
    }

    #[test]
    fn debug_redacts_private_key() {
        let pair = generate_key_pair().unwrap();
        let debug = format!("{pair:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&pair.private_key));
    }

    #[test]
    fn signature_from_other_key_does_not_verify() {
        let rng = SystemRandom::new();
        let a = generate_key_pair().unwrap();
        let b = generate_key_pair().unwrap();

        let signer = load_signing_key(&a.private_key).unwrap();
        let sig = signer.sign(&rng, b"payload").unwrap();

        let a_pub = parse_public_key(&a.public_key).unwrap();
        let b_pub = parse_public_key(&b.public_key).unwrap();
        assert!(verify_signature(&a_pub, b"payload", sig.as_ref()));
        assert!(!verify_signature(&b_pub, b"payload", sig.as_ref()));
    }
}
