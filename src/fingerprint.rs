//! Stable per-machine fingerprint used as key-derivation input.
//!
//! The fingerprint is SHA-256 over the [`Signal::ORDER`] readings joined with
//! `|`, with unreadable signals replaced by [`UNAVAILABLE`]. It is recomputed
//! whenever needed and never written to disk.

use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::hardware::{NativeSignals, Signal, SignalSource};

/// Stand-in for a signal that could not be read.
pub const UNAVAILABLE: &str = "unavailable";

/// Joins signal values before hashing.
pub const DELIMITER: &str = "|";

/// Lowercase hex SHA-256 digest identifying this machine.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fingerprint(<redacted>)")
    }
}

pub struct DeviceFingerprint;

impl DeviceFingerprint {
    /// Fingerprint of the host machine.
    pub fn compute() -> Fingerprint {
        Self::compute_with(&NativeSignals)
    }

    /// Fingerprint from an arbitrary signal source.
    pub fn compute_with(source: &dyn SignalSource) -> Fingerprint {
        let joined = Self::signal_string(source);
        let digest = Sha256::digest(joined.as_bytes());
        Fingerprint(hex::encode(digest))
    }

    /// The pre-hash string, in fixed order.
    fn signal_string(source: &dyn SignalSource) -> String {
        Signal::ORDER
            .iter()
            .map(|signal| {
                source
                    .read(*signal)
                    .unwrap_or_else(|| UNAVAILABLE.to_string())
            })
            .collect::<Vec<_>>()
            .join(DELIMITER)
    }
}
