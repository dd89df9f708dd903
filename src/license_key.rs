//! Human-readable license and trial keys.
//!
//! Keys look like `PERS-XXXX-XXXX-XXXX`: a configurable prefix followed by
//! random segments drawn from an alphabet without look-alike characters
//! (0, O, I, L, 1). A trial key uses the [`TRIAL_PREFIX`] instead.

use rand::Rng;

use crate::config::LicenseConfig;

/// Character set for key segments.
const KEY_CHARSET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Prefix used for trial keys regardless of configuration.
pub const TRIAL_PREFIX: &str = "TRIAL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKeyFormat {
    pub prefix: String,
    pub segments: u8,
    pub segment_length: u8,
}

impl Default for LicenseKeyFormat {
    fn default() -> Self {
        Self::from(&LicenseConfig::default())
    }
}

impl From<&LicenseConfig> for LicenseKeyFormat {
    fn from(config: &LicenseConfig) -> Self {
        Self {
            prefix: config.key_prefix.clone(),
            segments: config.key_segments,
            segment_length: config.key_segment_length,
        }
    }
}

impl LicenseKeyFormat {
    /// Same layout, trial prefix.
    pub fn for_trial(&self) -> Self {
        Self {
            prefix: TRIAL_PREFIX.to_string(),
            ..self.clone()
        }
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        let mut key = self.prefix.clone();
        for _ in 0..self.segments {
            key.push('-');
            key.extend((0..self.segment_length).map(|_| {
                KEY_CHARSET[rng.random_range(0..KEY_CHARSET.len())] as char
            }));
        }
        key
    }

    /// Whether `key` has this format's prefix, segment count and lengths,
    /// using only charset characters.
    pub fn matches(&self, key: &str) -> bool {
        let mut parts = key.split('-');
        if parts.next() != Some(self.prefix.as_str()) {
            return false;
        }

        let segments: Vec<&str> = parts.collect();
        segments.len() == self.segments as usize
            && segments.iter().all(|segment| {
                segment.len() == self.segment_length as usize
                    && segment.bytes().all(|b| KEY_CHARSET.contains(&b))
            })
    }
}

/// Generate a license key using the `license.*` configuration.
pub fn generate_license_key(config: &LicenseConfig) -> String {
    LicenseKeyFormat::from(config).generate()
}

/// Generate a trial key with the configured layout.
pub fn generate_trial_key(config: &LicenseConfig) -> String {
    LicenseKeyFormat::from(config).for_trial().generate()
}

/// Check a license key against the configured format.
pub fn validate_license_key_format(key: &str, config: &LicenseConfig) -> bool {
    LicenseKeyFormat::from(config).matches(key)
}
