//! Server-side license signing.
//!
//! Selection policy, in order:
//! 1. a configured P-256 private key signs with ECDSA/SHA-256
//! 2. otherwise a configured shared secret signs with HMAC-SHA256 (legacy)
//! 3. otherwise the record goes out unsigned and a warning is logged
//!
//! Callers validate business fields before signing; the signer trusts its
//! input. The input record is never mutated, a signed copy is returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use ring::hmac;
use ring::rand::SystemRandom;
use ring::signature::EcdsaKeyPair;

use crate::canonical::canonicalize;
use crate::config::{resolve_secret, SigningConfig};
use crate::errors::{KeywardError, KeywardResult};
use crate::keys::load_signing_key;
use crate::record::LicenseRecord;

/// Which signature the signer will attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    Asymmetric,
    LegacyHmac,
    Unsigned,
}

/// Counters for issued signatures, shared with whoever reports on them.
#[derive(Debug, Default)]
pub struct SigningStats {
    asymmetric: AtomicU64,
    legacy: AtomicU64,
    unsigned: AtomicU64,
}

/// Point-in-time copy of [`SigningStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigningStatsSnapshot {
    pub asymmetric: u64,
    pub legacy: u64,
    pub unsigned: u64,
}

impl SigningStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, mode: SigningMode) {
        let counter = match mode {
            SigningMode::Asymmetric => &self.asymmetric,
            SigningMode::LegacyHmac => &self.legacy,
            SigningMode::Unsigned => &self.unsigned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SigningStatsSnapshot {
        SigningStatsSnapshot {
            asymmetric: self.asymmetric.load(Ordering::Relaxed),
            legacy: self.legacy.load(Ordering::Relaxed),
            unsigned: self.unsigned.load(Ordering::Relaxed),
        }
    }
}

enum SigningKey {
    Ecdsa(EcdsaKeyPair),
    Hmac(hmac::Key),
    None,
}

pub struct LicenseSigner {
    key: SigningKey,
    rng: SystemRandom,
    stats: Arc<SigningStats>,
}

impl LicenseSigner {
    /// Build a signer from configured key material.
    ///
    /// A malformed private key is an error. Missing material is not: the
    /// signer then emits unsigned records.
    pub fn from_config(config: &SigningConfig, stats: Arc<SigningStats>) -> KeywardResult<Self> {
        let private_key = config
            .private_key
            .as_deref()
            .map(resolve_secret)
            .transpose()?
            .filter(|k| !k.is_empty());
        let shared_secret = config
            .shared_secret
            .as_deref()
            .map(resolve_secret)
            .transpose()?
            .filter(|s| !s.is_empty());

        match (private_key, shared_secret) {
            (Some(pk), _) => Self::with_private_key(&pk, stats),
            (None, Some(secret)) => Ok(Self::with_shared_secret(secret.as_bytes(), stats)),
            (None, None) => {
                tracing::warn!(
                    "no signing key or shared secret configured; licenses will be issued unsigned"
                );
                Ok(Self::unsigned(stats))
            }
        }
    }

    pub fn with_private_key(
        private_key_hex: &str,
        stats: Arc<SigningStats>,
    ) -> KeywardResult<Self> {
        Ok(Self {
            key: SigningKey::Ecdsa(load_signing_key(private_key_hex)?),
            rng: SystemRandom::new(),
            stats,
        })
    }

    pub fn with_shared_secret(secret: &[u8], stats: Arc<SigningStats>) -> Self {
        Self {
            key: SigningKey::Hmac(hmac::Key::new(hmac::HMAC_SHA256, secret)),
            rng: SystemRandom::new(),
            stats,
        }
    }

    /// Development-only signer that attaches no signature.
    pub fn unsigned(stats: Arc<SigningStats>) -> Self {
        Self {
            key: SigningKey::None,
            rng: SystemRandom::new(),
            stats,
        }
    }

    pub fn mode(&self) -> SigningMode {
        match self.key {
            SigningKey::Ecdsa(_) => SigningMode::Asymmetric,
            SigningKey::Hmac(_) => SigningMode::LegacyHmac,
            SigningKey::None => SigningMode::Unsigned,
        }
    }

    pub fn stats(&self) -> &Arc<SigningStats> {
        &self.stats
    }

    /// Return a signed copy of `record` with `signature` and `signed_at` set.
    pub fn sign(&self, record: &LicenseRecord) -> KeywardResult<LicenseRecord> {
        let payload = canonicalize(record)?;

        let signature = match &self.key {
            SigningKey::Ecdsa(key_pair) => {
                let sig = key_pair
                    .sign(&self.rng, payload.as_bytes())
                    .map_err(|_| KeywardError::SigningError("ECDSA signing failed".to_string()))?;
                Some(hex::encode(sig.as_ref()))
            }
            SigningKey::Hmac(key) => {
                Some(hex::encode(hmac::sign(key, payload.as_bytes()).as_ref()))
            }
            SigningKey::None => {
                tracing::warn!(
                    device_id = %record.device_id,
                    "issuing unsigned license record"
                );
                None
            }
        };

        self.stats.record(self.mode());

        let mut signed = record.clone();
        signed.signature = signature;
        signed.signed_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        Ok(signed)
    }

    /// Check a legacy HMAC signature with the shared secret.
    ///
    /// This is the server-side half of the legacy trust boundary: clients
    /// can only check the signature's shape. Returns `false` when this
    /// signer holds no shared secret.
    pub fn verify_legacy(&self, record: &LicenseRecord) -> bool {
        let SigningKey::Hmac(key) = &self.key else {
            return false;
        };
        let Some(tag) = record.signature.as_deref().and_then(|s| hex::decode(s).ok()) else {
            return false;
        };
        match canonicalize(record) {
            Ok(payload) => hmac::verify(key, payload.as_bytes(), &tag).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key_pair;

    fn sample() -> LicenseRecord {
        LicenseRecord::license("PERS-AAAA-BBBB-CCCC", "d1", "personal", 1)
    }

    #[test]
    fn ecdsa_signature_has_der_length() {
        let pair = generate_key_pair().unwrap();
        let signer =
            LicenseSigner::with_private_key(&pair.private_key, SigningStats::new()).unwrap();

        let signed = signer.sign(&sample()).unwrap();
        let sig = signed.signature.as_deref().unwrap();

        assert_eq!(signer.mode(), SigningMode::Asymmetric);
        assert!(sig.len() > 64 && sig.len() <= 144, "unexpected length {}", sig.len());
        assert!(hex::decode(sig).is_ok());
        assert!(signed.signed_at.is_some());
    }

    #[test]
    fn input_record_is_not_mutated() {
        let signer = LicenseSigner::with_shared_secret(b"secret", SigningStats::new());
        let record = sample();
        let signed = signer.sign(&record).unwrap();

        assert!(record.signature.is_none());
        assert!(record.signed_at.is_none());
        assert_ne!(record, signed);
    }

    #[test]
    fn hmac_signature_is_64_hex_and_deterministic() {
        let signer = LicenseSigner::with_shared_secret(b"secret", SigningStats::new());
        let a = signer.sign(&sample()).unwrap();
        let b = signer.sign(&sample()).unwrap();

        assert_eq!(a.signature.as_deref().map(str::len), Some(64));
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn legacy_verification_detects_tampering() {
        let signer = LicenseSigner::with_shared_secret(b"secret", SigningStats::new());
        let mut signed = signer.sign(&sample()).unwrap();
        assert!(signer.verify_legacy(&signed));

        signed.max_devices = 5;
        assert!(!signer.verify_legacy(&signed));

        let other = LicenseSigner::with_shared_secret(b"other", SigningStats::new());
        signed.max_devices = 1;
        assert!(!other.verify_legacy(&signed));
    }

    #[test]
    fn unsigned_fallback_without_material() {
        let stats = SigningStats::new();
        let signer = LicenseSigner::from_config(&SigningConfig::default(), stats.clone()).unwrap();
        let signed = signer.sign(&sample()).unwrap();

        assert_eq!(signer.mode(), SigningMode::Unsigned);
        assert!(signed.signature.is_none());
        assert_eq!(stats.snapshot().unsigned, 1);
    }

    #[test]
    fn private_key_takes_precedence_over_secret() {
        let pair = generate_key_pair().unwrap();
        let config = SigningConfig {
            private_key: Some(pair.private_key.clone()),
            shared_secret: Some("secret".into()),
        };
        let signer = LicenseSigner::from_config(&config, SigningStats::new()).unwrap();
        assert_eq!(signer.mode(), SigningMode::Asymmetric);
    }

    #[test]
    fn malformed_private_key_is_rejected() {
        let config = SigningConfig {
            private_key: Some("not-hex".into()),
            shared_secret: None,
        };
        assert!(LicenseSigner::from_config(&config, SigningStats::new()).is_err());
    }

    #[test]
    fn stats_count_each_mode() {
        let stats = SigningStats::new();
        let hmac_signer = LicenseSigner::with_shared_secret(b"s", stats.clone());
        hmac_signer.sign(&sample()).unwrap();
        hmac_signer.sign(&sample()).unwrap();

        let pair = generate_key_pair().unwrap();
        LicenseSigner::with_private_key(&pair.private_key, stats.clone())
            .unwrap()
            .sign(&sample())
            .unwrap();

        assert_eq!(
            stats.snapshot(),
            SigningStatsSnapshot {
                asymmetric: 1,
                legacy: 2,
                unsigned: 0
            }
        );
    }
}
