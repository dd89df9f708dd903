//! Device-bound persistence of the signed license artifact.
//!
//! The record is serialized to JSON, encrypted with [`DeviceBoundCipher`] and
//! written to `license.enc` in the private data directory. A copy moved to
//! another machine reads back as [`CachedLicense::Unreadable`].
//!
//! Loading always re-runs [`LicenseVerifier::verify`]; the cached file is
//! never trusted on its own.

use std::path::PathBuf;

use tokio::fs;

use crate::config::StorageConfig;
use crate::device_cipher::DeviceBoundCipher;
use crate::errors::{KeywardError, KeywardResult};
use crate::fingerprint::Fingerprint;
use crate::record::LicenseRecord;
use crate::storage::{create_private_dir, data_dir, read_optional, write_private};
use crate::verifier::LicenseVerifier;

/// File name for the encrypted license artifact.
pub const LICENSE_FILE: &str = "license.enc";

/// Outcome of reading the cached license.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedLicense {
    /// Nothing stored.
    Missing,
    /// Stored, but not decryptable on this device (copied, corrupted or
    /// tampered with).
    Unreadable,
    /// Decrypted, but the signature did not verify.
    Untrusted,
    /// Verified, but past its `expires_at`.
    Expired(LicenseRecord),
    Valid(LicenseRecord),
}

impl CachedLicense {
    /// The record, if it can be trusted right now.
    pub fn into_trusted(self) -> Option<LicenseRecord> {
        match self {
            CachedLicense::Valid(record) => Some(record),
            _ => None,
        }
    }

    /// Whether the caller must send the user through activation again.
    pub fn needs_activation(&self) -> bool {
        !matches!(self, CachedLicense::Valid(_))
    }
}

pub struct LicenseStore {
    path: PathBuf,
    cipher: DeviceBoundCipher,
    verifier: LicenseVerifier,
}

impl LicenseStore {
    /// Store rooted at `dir`, bound to `fingerprint`.
    pub fn new(
        dir: impl Into<PathBuf>,
        fingerprint: &Fingerprint,
        verifier: LicenseVerifier,
    ) -> Self {
        Self {
            path: dir.into().join(LICENSE_FILE),
            cipher: DeviceBoundCipher::new(fingerprint),
            verifier,
        }
    }

    /// Store in the configured data directory.
    pub fn from_config(
        config: &StorageConfig,
        fingerprint: &Fingerprint,
        verifier: LicenseVerifier,
    ) -> KeywardResult<Self> {
        Ok(Self::new(data_dir(config)?, fingerprint, verifier))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Encrypt and persist a signed record, replacing any previous one.
    pub async fn save(&self, record: &LicenseRecord) -> KeywardResult<()> {
        let json = serde_json::to_vec(record)?;
        let blob = self.cipher.encrypt(&json)?;

        if let Some(dir) = self.path.parent() {
            create_private_dir(dir).await?;
        }
        write_private(&self.path, blob.as_bytes()).await?;
        tracing::debug!("stored license artifact at {}", self.path.display());
        Ok(())
    }

    /// Read, decrypt and verify the stored record.
    pub async fn load(&self) -> CachedLicense {
        let blob = match read_optional(&self.path).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return CachedLicense::Missing,
            Err(e) => {
                tracing::warn!("license artifact unreadable: {e}");
                return CachedLicense::Unreadable;
            }
        };

        let Some(plaintext) = self.cipher.decrypt(&blob) else {
            tracing::warn!("license artifact does not decrypt on this device");
            return CachedLicense::Unreadable;
        };

        let record: LicenseRecord = match serde_json::from_slice(&plaintext) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("license artifact is not a license record: {e}");
                return CachedLicense::Unreadable;
            }
        };

        if !self.verifier.verify(&record) {
            return CachedLicense::Untrusted;
        }
        if record.is_expired() {
            return CachedLicense::Expired(record);
        }
        CachedLicense::Valid(record)
    }

    /// Remove the stored record. Missing files are not an error.
    pub async fn clear(&self) -> KeywardResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KeywardError::StorageError(e)),
        }
    }
}
