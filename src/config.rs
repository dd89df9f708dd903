//! Configuration system for Keyward.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `keyward.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `KEYWARD_SIGNING_PRIVATE_KEY` - Hex PKCS#8 P-256 private key
//! - `KEYWARD_SIGNING_SHARED_SECRET` - Legacy HMAC shared secret
//! - `KEYWARD_PUBLIC_KEY` - Hex public key used by the verifier
//! - `KEYWARD_ENVIRONMENT` - `development` or `production` (default)
//! - `KEYWARD_LICENSE_KEY_PREFIX` - License key prefix
//! - `KEYWARD_DATA_DIR` - Override for the private data directory
//! - `KEYWARD_LOGGING_ENABLED` - Enable logging in the CLI
//! - `KEYWARD_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `KEYWARD_LOG_JSON` - Emit JSON log lines
//!
//! Secret values may be written as `env:VAR_NAME` to read them from another
//! environment variable at use time.

use config::Config;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::errors::{KeywardError, KeywardResult};
use crate::keys::{parse_public_key, EMBEDDED_PUBLIC_KEY};

/// Global configuration singleton.
static CONFIG: OnceLock<KeywardConfig> = OnceLock::new();

/// Name of the per-user data directory.
pub const APP_DIR_NAME: &str = "keyward";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywardConfig {
    pub signing: SigningConfig,
    pub verification: VerificationConfig,
    pub license: LicenseConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Signing material. Only the signing service sets these.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Hex PKCS#8 private key (or `env:VAR_NAME`)
    pub private_key: Option<String>,
    /// Legacy HMAC secret (or `env:VAR_NAME`)
    pub shared_secret: Option<String>,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Deployment environment, which decides how unsigned records are treated.
///
/// Defaults to `Production`: unsigned records are only accepted when a
/// deployment opts into `development` explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = KeywardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(KeywardError::ConfigError(format!(
                "environment must be 'development' or 'production', got '{other}'"
            ))),
        }
    }
}

/// Client-side verification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Hex uncompressed public key
    pub public_key: Option<String>,
    pub environment: Environment,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            public_key: EMBEDDED_PUBLIC_KEY.map(str::to_string),
            environment: Environment::default(),
        }
    }
}

/// License key generation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Prefix for generated license keys (e.g., "PERS" -> "PERS-XXXX-XXXX-XXXX")
    pub key_prefix: String,
    /// Number of segments in the license key
    pub key_segments: u8,
    /// Characters per segment
    pub key_segment_length: u8,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            key_prefix: "PERS".to_string(),
            key_segments: 3,
            key_segment_length: 4,
        }
    }
}

/// Local storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory when set
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the private data directory.
    ///
    /// - Windows: `%APPDATA%\keyward\`
    /// - macOS: `~/Library/Application Support/keyward/`
    /// - Linux: `~/.local/share/keyward/`
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join(APP_DIR_NAME)))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
            json: false,
        }
    }
}

fn config_err(e: config::ConfigError) -> KeywardError {
    KeywardError::ConfigError(e.to_string())
}

impl KeywardConfig {
    /// Load configuration from `keyward.toml` (optional) and environment.
    fn load() -> KeywardResult<Self> {
        Self::load_with(config::File::with_name("keyward").required(false))
    }

    /// Load configuration from an explicit file, still honoring the
    /// environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> KeywardResult<Self> {
        let config = Self::load_with(config::File::from(path.as_ref()).required(true))?;
        config.validate()?;
        Ok(config)
    }

    fn load_with<S>(file: S) -> KeywardResult<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let builder = Config::builder()
            .set_default("license.key_prefix", "PERS")
            .map_err(config_err)?
            .set_default("license.key_segments", 3)
            .map_err(config_err)?
            .set_default("license.key_segment_length", 4)
            .map_err(config_err)?
            .set_default("verification.environment", "production")
            .map_err(config_err)?
            .set_default("logging.enabled", false)
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?
            .add_source(file)
            .set_override_option(
                "signing.private_key",
                env::var("KEYWARD_SIGNING_PRIVATE_KEY").ok(),
            )
            .map_err(config_err)?
            .set_override_option(
                "signing.shared_secret",
                env::var("KEYWARD_SIGNING_SHARED_SECRET").ok(),
            )
            .map_err(config_err)?
            .set_override_option("verification.public_key", env::var("KEYWARD_PUBLIC_KEY").ok())
            .map_err(config_err)?
            .set_override_option(
                "verification.environment",
                env::var("KEYWARD_ENVIRONMENT").ok().map(|v| v.to_lowercase()),
            )
            .map_err(config_err)?
            .set_override_option(
                "license.key_prefix",
                env::var("KEYWARD_LICENSE_KEY_PREFIX").ok(),
            )
            .map_err(config_err)?
            .set_override_option("storage.data_dir", env::var("KEYWARD_DATA_DIR").ok())
            .map_err(config_err)?
            .set_override_option(
                "logging.enabled",
                env::var("KEYWARD_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("KEYWARD_LOG_LEVEL").ok())
            .map_err(config_err)?
            .set_override_option(
                "logging.json",
                env::var("KEYWARD_LOG_JSON")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| KeywardError::ConfigError(format!("failed to build config: {e}")))?;

        let mut config: KeywardConfig = settings
            .try_deserialize()
            .map_err(|e| KeywardError::ConfigError(format!("failed to deserialize config: {e}")))?;

        if config.verification.public_key.is_none() {
            config.verification.public_key = EMBEDDED_PUBLIC_KEY.map(str::to_string);
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> KeywardResult<()> {
        if self.license.key_prefix.is_empty() {
            return Err(KeywardError::ConfigError(
                "license.key_prefix cannot be empty".to_string(),
            ));
        }
        if self.license.key_segments == 0 {
            return Err(KeywardError::ConfigError(
                "license.key_segments must be greater than 0".to_string(),
            ));
        }
        if self.license.key_segment_length == 0 {
            return Err(KeywardError::ConfigError(
                "license.key_segment_length must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(KeywardError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if let Some(public_key) = self.verification.public_key.as_deref() {
            parse_public_key(public_key).map_err(|e| {
                KeywardError::ConfigError(format!("verification.public_key is invalid: {e}"))
            })?;
        }

        Ok(())
    }
}

/// Resolve a secret value, following the `env:VAR_NAME` indirection.
pub fn resolve_secret(value: &str) -> KeywardResult<String> {
    match value.strip_prefix("env:") {
        Some(var) => env::var(var).map_err(|_| {
            KeywardError::ConfigError(format!("environment variable '{var}' is not set"))
        }),
        None => Ok(value.to_string()),
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> KeywardResult<&'static KeywardConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = KeywardConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is equivalent.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| KeywardError::ConfigError("configuration was not stored".to_string()))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
pub fn init_config() -> KeywardResult<&'static KeywardConfig> {
    get_config()
}
