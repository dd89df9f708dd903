//! Client-side license verification.
//!
//! A signature is classified into a [`SignatureShape`] once and verification
//! dispatches on that shape:
//!
//! | shape | outcome |
//! |---|---|
//! | absent, development | accept |
//! | absent, production (the default) | reject |
//! | asymmetric, public key configured | accept iff the ECDSA signature verifies |
//! | legacy HMAC (64 hex chars) | accept on shape alone |
//! | anything else, including a non-string wire value | reject |
//!
//! # Legacy trust gap
//!
//! The client cannot check an HMAC without the shared secret, so legacy
//! signatures are accepted on structure only. Anyone able to edit a stored
//! record can replace its signature with any 64-character hex string and it
//! will be accepted here. The server re-checks legacy signatures with
//! `LicenseSigner::verify_legacy` whenever a record comes back to it.

use serde_json::Value;

use crate::canonical::{canonicalize, canonicalize_value};
use crate::config::{Environment, VerificationConfig};
use crate::errors::{KeywardError, KeywardResult};
use crate::keys::{parse_public_key, verify_signature};
use crate::record::LicenseRecord;

/// Hex length of an HMAC-SHA256 digest.
pub const LEGACY_SIGNATURE_LEN: usize = 64;

/// The form a record's signature takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureShape {
    /// Missing or empty.
    Absent,
    /// Long-form hex, decoded DER bytes.
    Asymmetric(Vec<u8>),
    /// Exactly 64 hex characters.
    LegacyHmac,
    Malformed,
}

impl SignatureShape {
    pub fn classify(signature: Option<&str>) -> Self {
        let sig = match signature {
            None | Some("") => return SignatureShape::Absent,
            Some(sig) => sig,
        };

        if !sig.bytes().all(|b| b.is_ascii_hexdigit()) {
            return SignatureShape::Malformed;
        }

        match sig.len() {
            LEGACY_SIGNATURE_LEN => SignatureShape::LegacyHmac,
            len if len > LEGACY_SIGNATURE_LEN => match hex::decode(sig) {
                Ok(bytes) => SignatureShape::Asymmetric(bytes),
                Err(_) => SignatureShape::Malformed,
            },
            _ => SignatureShape::Malformed,
        }
    }

    /// Classify the `signature` member of a raw wire record. A present value
    /// that is neither a string nor `null` is malformed.
    pub fn classify_value(signature: Option<&Value>) -> Self {
        match signature {
            None | Some(Value::Null) => SignatureShape::Absent,
            Some(Value::String(sig)) => Self::classify(Some(sig)),
            Some(_) => SignatureShape::Malformed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LicenseVerifier {
    public_key: Option<Vec<u8>>,
    environment: Environment,
}

impl LicenseVerifier {
    pub fn new(public_key: Option<Vec<u8>>, environment: Environment) -> Self {
        Self {
            public_key,
            environment,
        }
    }

    /// Build a verifier from a hex public key.
    pub fn with_public_key_hex(
        public_key_hex: &str,
        environment: Environment,
    ) -> KeywardResult<Self> {
        Ok(Self::new(Some(parse_public_key(public_key_hex)?), environment))
    }

    pub fn from_config(config: &VerificationConfig) -> KeywardResult<Self> {
        let public_key = config
            .public_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .map(parse_public_key)
            .transpose()?;
        if public_key.is_none() {
            tracing::warn!(
                "no license public key configured; asymmetric signatures will be rejected"
            );
        }
        Ok(Self::new(public_key, config.environment))
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Verify a typed record.
    pub fn verify(&self, record: &LicenseRecord) -> bool {
        let shape = SignatureShape::classify(record.signature.as_deref());
        self.verify_payload(shape, || canonicalize(record))
    }

    /// Verify a raw wire record without going through [`LicenseRecord`].
    pub fn verify_value(&self, record: &Value) -> bool {
        let shape = SignatureShape::classify_value(record.get("signature"));
        self.verify_payload(shape, || canonicalize_value(record))
    }

    /// [`verify`](Self::verify) on the blocking pool, for async callers.
    pub async fn verify_async(&self, record: &LicenseRecord) -> bool {
        let verifier = self.clone();
        let record = record.clone();
        match tokio::task::spawn_blocking(move || verifier.verify(&record)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!("verification task failed: {}", KeywardError::from(e));
                false
            }
        }
    }

    /// Format-only check, no cryptographic proof.
    ///
    /// Accepts any record whose signature shape would be eligible for
    /// acceptance by [`verify`](Self::verify).
    pub fn verify_structure(&self, record: &LicenseRecord) -> bool {
        match SignatureShape::classify(record.signature.as_deref()) {
            SignatureShape::Absent => !self.environment.is_production(),
            SignatureShape::Asymmetric(_) => self.public_key.is_some(),
            SignatureShape::LegacyHmac => true,
            SignatureShape::Malformed => false,
        }
    }

    fn verify_payload<F>(&self, shape: SignatureShape, payload: F) -> bool
    where
        F: FnOnce() -> KeywardResult<String>,
    {
        match shape {
            SignatureShape::Absent => {
                if self.environment.is_production() {
                    tracing::warn!("rejecting unsigned license record in production");
                    false
                } else {
                    tracing::debug!("accepting unsigned license record outside production");
                    true
                }
            }
            SignatureShape::Asymmetric(sig) => {
                let Some(public_key) = self.public_key.as_deref() else {
                    tracing::warn!("asymmetric signature present but no public key configured");
                    return false;
                };
                let payload = match payload() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("could not canonicalize license record: {e}");
                        return false;
                    }
                };
                let valid = verify_signature(public_key, payload.as_bytes(), &sig);
                if !valid {
                    tracing::warn!("license signature verification failed");
                }
                valid
            }
            // Structural acceptance only, see the module docs.
            SignatureShape::LegacyHmac => true,
            SignatureShape::Malformed => {
                tracing::warn!("rejecting license record with malformed signature");
                false
            }
        }
    }
}
