//! Keyward - offline license signing, device binding and vault encryption
//!
//! # Features
//!
//! Keyward uses feature flags so a client build ships only what it needs:
//!
//! - `signer` - Key pair generation and license signing. Enabled by default.
//! - `cli` - The `keyward` admin binary. Enabled by default, requires `signer`.
//!
//! # Example
//!
//! ```toml
//! # Signing service or admin tooling (defaults)
//! keyward = { git = "https://github.com/dmriding/keyward" }
//!
//! # Client-only (verification, fingerprinting, device-bound storage, vault)
//! keyward = { git = "https://github.com/dmriding/keyward", default-features = false }
//! ```

// Core modules (always available)
pub mod canonical;
pub mod config;
pub mod encryption;
pub mod errors;
pub mod keys;
pub mod license_key;
pub mod logging;
pub mod record;
pub mod storage;

// Client-side modules (always available)
pub mod device_cipher;
pub mod fingerprint;
pub mod hardware;
pub mod license_store;
pub mod vault;
pub mod verifier;

// Server-side signing (requires "signer" feature)
#[cfg(feature = "signer")]
pub mod signer;

pub use config::{get_config, init_config, Environment, KeywardConfig};
pub use device_cipher::DeviceBoundCipher;
pub use errors::{KeywardError, KeywardResult};
pub use fingerprint::{DeviceFingerprint, Fingerprint};
pub use license_store::{CachedLicense, LicenseStore};
pub use record::LicenseRecord;
pub use vault::VaultCipher;
pub use verifier::LicenseVerifier;

#[cfg(feature = "signer")]
pub use signer::{LicenseSigner, SigningMode, SigningStats};
