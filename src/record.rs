//! The signed license/trial record exchanged between signer and client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::KeywardResult;

/// Which credential a record was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential<'a> {
    License(&'a str),
    Trial(&'a str),
}

/// A license or trial credential bound to one device.
///
/// The signature covers the canonical encoding of every field except
/// `signature` and `signed_at`. Unknown wire fields are kept in `extra` so a
/// newer signer's fields stay covered when an older client re-encodes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_key: Option<String>,

    pub device_id: String,
    pub plan_type: String,
    pub max_devices: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transfer_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,

    /// Hex signature; `None` only for development-mode unsigned output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// ISO 8601 time the signature was attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LicenseRecord {
    /// Unsigned record for a purchased license key.
    pub fn license(
        license_key: impl Into<String>,
        device_id: impl Into<String>,
        plan_type: impl Into<String>,
        max_devices: u32,
    ) -> Self {
        Self::bare(Some(license_key.into()), None, device_id.into(), plan_type.into(), max_devices)
    }

    /// Unsigned record for a trial key.
    pub fn trial(
        trial_key: impl Into<String>,
        device_id: impl Into<String>,
        plan_type: impl Into<String>,
        max_devices: u32,
    ) -> Self {
        Self::bare(None, Some(trial_key.into()), device_id.into(), plan_type.into(), max_devices)
    }

    fn bare(
        license_key: Option<String>,
        trial_key: Option<String>,
        device_id: String,
        plan_type: String,
        max_devices: u32,
    ) -> Self {
        Self {
            license_key,
            trial_key,
            device_id,
            plan_type,
            max_devices,
            activated_at: None,
            product_type: None,
            transfer_count: None,
            last_transfer_at: None,
            start_date: None,
            expires_at: None,
            signature: None,
            signed_at: None,
            extra: Map::new(),
        }
    }

    /// The key this record was issued for. License keys win if a malformed
    /// wire record carries both.
    pub fn credential(&self) -> Option<Credential<'_>> {
        match (&self.license_key, &self.trial_key) {
            (Some(key), _) => Some(Credential::License(key)),
            (None, Some(key)) => Some(Credential::Trial(key)),
            (None, None) => None,
        }
    }

    pub fn is_trial(&self) -> bool {
        matches!(self.credential(), Some(Credential::Trial(_)))
    }

    /// Whether `expires_at` lies in the past.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether `expires_at` lies before `now`. Missing or unparseable
    /// expiry dates count as not expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match &self.expires_at {
            Some(expires) => match DateTime::parse_from_rfc3339(expires) {
                Ok(exp_time) => now >= exp_time.with_timezone(&Utc),
                Err(_) => false,
            },
            None => false,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn to_value(&self) -> KeywardResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> KeywardResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn optional_fields_are_omitted_on_the_wire() {
        let record = LicenseRecord::license("PERS-AAAA-BBBB-CCCC", "d1", "personal", 1);
        let value = record.to_value().unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 4);
        assert!(obj.contains_key("license_key"));
        assert!(!obj.contains_key("trial_key"));
        assert!(!obj.contains_key("signature"));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let value = json!({
            "trial_key": "TRIAL-1",
            "device_id": "d1",
            "plan_type": "trial",
            "max_devices": 1,
            "seat_label": "office"
        });
        let record = LicenseRecord::from_value(value.clone()).unwrap();

        assert!(record.is_trial());
        assert_eq!(record.extra.get("seat_label"), Some(&json!("office")));
        assert_eq!(record.to_value().unwrap(), value);
    }

    #[test]
    fn credential_prefers_license_key() {
        let mut record = LicenseRecord::trial("TRIAL-1", "d1", "trial", 1);
        assert_eq!(record.credential(), Some(Credential::Trial("TRIAL-1")));

        record.license_key = Some("PERS-1".into());
        assert_eq!(record.credential(), Some(Credential::License("PERS-1")));
    }

    #[test]
    fn expiry_checks() {
        let mut record = LicenseRecord::license("PERS-1", "d1", "personal", 1);
        assert!(!record.is_expired());

        record.expires_at = Some((Utc::now() - Duration::days(1)).to_rfc3339());
        assert!(record.is_expired());

        record.expires_at = Some((Utc::now() + Duration::days(30)).to_rfc3339());
        assert!(!record.is_expired());

        record.expires_at = Some("not a date".into());
        assert!(!record.is_expired());
    }
}
