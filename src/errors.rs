//! Error types for Keyward.
//!
//! Most failures never reach callers as errors: verification and device-bound
//! decryption collapse into `false` / `None`, and unreadable vault files fall
//! back to the backup slot. `KeywardError` covers what is left, namely
//! configuration problems, malformed key material, storage failures and
//! misuse of a locked vault.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type KeywardResult<T> = Result<T, KeywardError>;

#[derive(Debug, Error)]
pub enum KeywardError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Key material was rejected by the underlying primitive.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A freshly generated key pair failed its sign/verify round trip.
    #[error("key pair self-test failed")]
    SelfTestFailed,

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("encryption failed: {0}")]
    EncryptionError(String),

    #[error("decryption failed: {0}")]
    DecryptionError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    StorageError(#[from] std::io::Error),

    /// The vault has no derived key; call `unlock` first.
    #[error("vault is locked")]
    VaultLocked,

    /// `initialize` was called on a directory that already holds a salt.
    #[error("vault is already initialized")]
    VaultAlreadyInitialized,

    /// A blocking cryptographic task panicked or was cancelled.
    #[error("background task failed: {0}")]
    TaskError(String),
}

impl From<tokio::task::JoinError> for KeywardError {
    fn from(e: tokio::task::JoinError) -> Self {
        KeywardError::TaskError(e.to_string())
    }
}
