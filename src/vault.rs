//! Password-keyed encryption of the local vault file.
//!
//! ## Layout
//!
//! In the vault directory:
//! - `vault.dat` - primary encrypted blob
//! - `vault.dat.bak` - the previous primary, rotated in on every save
//! - `vault.salt` - JSON holding the salt and an encrypted verification token
//!
//! The salt is generated once by [`VaultCipher::initialize`] and never
//! changes. The verification token lets [`VaultCipher::unlock`] check a
//! candidate password without touching the vault contents.
//!
//! ## Concurrency
//!
//! A vault has a single writer. Callers must serialize `save` calls so the
//! backup-then-write sequence never interleaves.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::fs;
use zeroize::Zeroizing;

use crate::config::StorageConfig;
use crate::encryption::{
    decrypt_from_base64, derive_key, encrypt_to_base64, random_bytes, DerivedKey,
};
use crate::errors::{KeywardError, KeywardResult};
use crate::storage::{
    create_private_dir, data_dir, overwrite_and_remove, read_optional, restrict_file,
    write_private,
};

pub const VAULT_FILE: &str = "vault.dat";
pub const BACKUP_FILE: &str = "vault.dat.bak";
pub const SALT_FILE: &str = "vault.salt";

/// Salt length in bytes (256-bit).
pub const SALT_SIZE: usize = 32;

/// Known plaintext encrypted into the salt file at initialization.
const VERIFICATION_TOKEN: &[u8] = b"keyward-vault-verification-v1";

const SALT_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SaltRecord {
    version: u32,
    /// Base64 salt.
    salt: String,
    /// Encrypted [`VERIFICATION_TOKEN`].
    verifier: String,
}

/// Where a vault's three files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    pub dir: PathBuf,
    pub primary: PathBuf,
    pub backup: PathBuf,
    pub salt: PathBuf,
}

impl VaultPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            primary: dir.join(VAULT_FILE),
            backup: dir.join(BACKUP_FILE),
            salt: dir.join(SALT_FILE),
            dir,
        }
    }
}

pub struct VaultCipher {
    paths: VaultPaths,
    key: Option<DerivedKey>,
}

impl VaultCipher {
    /// A locked vault rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: VaultPaths::new(dir),
            key: None,
        }
    }

    /// A locked vault in the `vault` subdirectory of the data directory.
    pub fn from_config(config: &StorageConfig) -> KeywardResult<Self> {
        Ok(Self::new(data_dir(config)?.join("vault")))
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    /// Whether a salt file exists.
    pub async fn is_initialized(&self) -> bool {
        fs::try_exists(&self.paths.salt).await.unwrap_or(false)
    }

    /// Drop the derived key.
    pub fn lock(&mut self) {
        self.key = None;
    }

    /// Create the salt and verification token for a new vault and leave it
    /// unlocked.
    pub async fn initialize(&mut self, master_password: &str) -> KeywardResult<()> {
        if self.is_initialized().await {
            return Err(KeywardError::VaultAlreadyInitialized);
        }
        create_private_dir(&self.paths.dir).await?;

        let mut salt = vec![0u8; SALT_SIZE];
        random_bytes(&mut salt);

        let key = derive_password_key(master_password, salt.clone()).await?;
        let record = SaltRecord {
            version: SALT_FILE_VERSION,
            salt: B64.encode(&salt),
            verifier: encrypt_to_base64(VERIFICATION_TOKEN, key.as_slice())?,
        };
        write_private(&self.paths.salt, &serde_json::to_vec(&record)?).await?;

        self.key = Some(key);
        tracing::info!(dir = %self.paths.dir.display(), "initialized new vault");
        Ok(())
    }

    /// Derive the key for `master_password` and keep it if the verification
    /// token decrypts. Any failure leaves the vault locked.
    pub async fn unlock(&mut self, master_password: &str) -> bool {
        self.key = None;

        let record = match self.read_salt_record().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("unlock attempted on uninitialized vault");
                return false;
            }
            Err(e) => {
                tracing::warn!("vault salt file unreadable: {e}");
                return false;
            }
        };

        let Ok(salt) = B64.decode(record.salt.trim()) else {
            tracing::warn!("vault salt file holds invalid base64");
            return false;
        };

        let key = match derive_password_key(master_password, salt).await {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("vault key derivation failed: {e}");
                return false;
            }
        };

        match decrypt_from_base64(&record.verifier, key.as_slice()) {
            Ok(token) if token.as_slice() == VERIFICATION_TOKEN => {
                self.key = Some(key);
                true
            }
            _ => {
                tracing::debug!("vault unlock rejected");
                false
            }
        }
    }

    /// Encrypt `plaintext`, rotate the current primary into the backup slot,
    /// then write the new primary.
    ///
    /// If the rotation fails for any reason other than a missing primary, the
    /// primary is left untouched and the error is returned, so the backup
    /// never falls more than one save behind.
    pub async fn save(&self, plaintext: &[u8]) -> KeywardResult<()> {
        let key = self.key.as_ref().ok_or(KeywardError::VaultLocked)?;
        let blob = encrypt_to_base64(plaintext, key.as_slice())?;

        create_private_dir(&self.paths.dir).await?;

        match fs::copy(&self.paths.primary, &self.paths.backup).await {
            Ok(_) => restrict_file(&self.paths.backup).await?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("could not rotate vault into backup slot: {e}");
                return Err(KeywardError::StorageError(e));
            }
        }

        write_private(&self.paths.primary, blob.as_bytes()).await?;
        tracing::debug!("saved vault ({} bytes plaintext)", plaintext.len());
        Ok(())
    }

    /// Decrypt the primary file, falling back to the backup and promoting it
    /// when the primary is missing or unreadable. `None` means neither slot
    /// holds a readable vault.
    pub async fn load(&self) -> KeywardResult<Option<Vec<u8>>> {
        let key = self.key.as_ref().ok_or(KeywardError::VaultLocked)?;

        match read_slot(&self.paths.primary, key).await {
            Ok(Some(plaintext)) => return Ok(Some(plaintext)),
            Ok(None) => tracing::debug!("no primary vault file"),
            Err(e) => tracing::warn!("primary vault file unreadable: {e}"),
        }

        match read_slot(&self.paths.backup, key).await {
            Ok(Some(plaintext)) => {
                tracing::warn!("recovered vault from backup slot, promoting to primary");
                let promoted = match fs::copy(&self.paths.backup, &self.paths.primary).await {
                    Ok(_) => restrict_file(&self.paths.primary).await,
                    Err(e) => Err(KeywardError::StorageError(e)),
                };
                if let Err(e) = promoted {
                    tracing::warn!("could not promote vault backup: {e}");
                }
                Ok(Some(plaintext))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!("vault backup unreadable: {e}");
                Ok(None)
            }
        }
    }

    /// Overwrite the primary, backup and salt files with random bytes,
    /// remove them, and lock.
    ///
    /// Every file is attempted even if an earlier one fails; the first error
    /// is returned afterwards.
    pub async fn secure_delete(&mut self) -> KeywardResult<()> {
        self.key = None;

        let mut first_error = None;
        for path in [&self.paths.primary, &self.paths.backup, &self.paths.salt] {
            if let Err(e) = overwrite_and_remove(path).await {
                tracing::warn!("could not wipe {}: {e}", path.display());
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(dir = %self.paths.dir.display(), "securely deleted vault");
                Ok(())
            }
        }
    }

    async fn read_salt_record(&self) -> KeywardResult<Option<SaltRecord>> {
        match read_optional(&self.paths.salt).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Run PBKDF2 on the blocking pool.
async fn derive_password_key(password: &str, salt: Vec<u8>) -> KeywardResult<DerivedKey> {
    let password = Zeroizing::new(password.as_bytes().to_vec());
    let key = tokio::task::spawn_blocking(move || derive_key(&password, &salt)).await?;
    Ok(key)
}

async fn read_slot(path: &Path, key: &DerivedKey) -> KeywardResult<Option<Vec<u8>>> {
    match read_optional(path).await? {
        Some(blob) => Ok(Some(decrypt_from_base64(&blob, key.as_slice())?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn locked_vault_refuses_io() {
        let dir = tempfile::tempdir().unwrap();
        let vault = VaultCipher::new(dir.path());

        assert!(matches!(vault.save(b"x").await, Err(KeywardError::VaultLocked)));
        assert!(matches!(vault.load().await, Err(KeywardError::VaultLocked)));
    }

    #[tokio::test]
    async fn unlock_without_salt_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = VaultCipher::new(dir.path());
        assert!(!vault.unlock("anything").await);
        assert!(!vault.is_unlocked());
    }

    #[tokio::test]
    async fn initialize_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = VaultCipher::new(dir.path());
        vault.initialize("pw").await.unwrap();

        assert!(matches!(
            vault.initialize("pw").await,
            Err(KeywardError::VaultAlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn salt_file_does_not_contain_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = VaultCipher::new(dir.path());
        vault.initialize("correct-horse").await.unwrap();

        let raw = std::fs::read_to_string(&vault.paths().salt).unwrap();
        let record: SaltRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.version, SALT_FILE_VERSION);
        assert_eq!(B64.decode(record.salt).unwrap().len(), SALT_SIZE);
        assert!(!raw.contains("correct-horse"));
    }

    #[tokio::test]
    async fn failed_unlock_relocks() {
        let dir = tempfile::tempdir().unwrap();
        let mut vault = VaultCipher::new(dir.path());
        vault.initialize("right").await.unwrap();
        assert!(vault.is_unlocked());

        assert!(!vault.unlock("wrong").await);
        assert!(!vault.is_unlocked());
    }
}
