#![cfg(feature = "signer")]

use keyward::config::{Environment, VerificationConfig};
use keyward::keys::generate_key_pair;
use keyward::{LicenseRecord, LicenseSigner, LicenseVerifier, SigningMode, SigningStats};
use serde_json::json;

fn sample_record() -> LicenseRecord {
    let mut record = LicenseRecord::license("PERS-AAAA-BBBB-CCCC", "d1", "personal", 1);
    record.activated_at = Some("2024-01-01T00:00:00Z".to_string());
    record.product_type = Some("desktop".to_string());
    record.transfer_count = Some(0);
    record.expires_at = Some("2099-01-01T00:00:00Z".to_string());
    record
}

fn signer_and_verifier() -> (LicenseSigner, LicenseVerifier) {
    let pair = generate_key_pair().unwrap();
    let signer = LicenseSigner::with_private_key(&pair.private_key, SigningStats::new()).unwrap();
    let verifier =
        LicenseVerifier::with_public_key_hex(&pair.public_key, Environment::Production).unwrap();
    (signer, verifier)
}

#[test]
fn signed_record_verifies() {
    let (signer, verifier) = signer_and_verifier();
    let signed = signer.sign(&sample_record()).unwrap();

    assert_eq!(signer.mode(), SigningMode::Asymmetric);
    assert!(signed.signature.as_deref().unwrap().len() > 64);
    assert!(signed.signed_at.is_some());
    assert!(signed.is_signed());
    assert!(verifier.verify(&signed));
    assert!(verifier.verify_structure(&signed));
}

#[test]
fn sign_does_not_mutate_input() {
    let (signer, _) = signer_and_verifier();
    let record = sample_record();
    let _ = signer.sign(&record).unwrap();
    assert!(record.signature.is_none());
    assert!(record.signed_at.is_none());
}

#[test]
fn changing_any_signed_field_breaks_verification() {
    let (signer, verifier) = signer_and_verifier();
    let signed = signer.sign(&sample_record()).unwrap();

    let tampered: Vec<fn(&mut LicenseRecord)> = vec![
        |r| r.device_id = "d2".to_string(),
        |r| r.plan_type = "family".to_string(),
        |r| r.max_devices = 5,
        |r| r.license_key = Some("PERS-AAAA-BBBB-CCCD".to_string()),
        |r| r.expires_at = Some("2199-01-01T00:00:00Z".to_string()),
        |r| r.transfer_count = Some(1),
        |r| r.product_type = None,
        |r| {
            r.extra.insert("seats".to_string(), json!(10));
        },
    ];

    for change in tampered {
        let mut copy = signed.clone();
        change(&mut copy);
        assert!(!verifier.verify(&copy), "tampered record verified: {copy:?}");
    }
}

#[test]
fn signed_at_is_not_covered() {
    let (signer, verifier) = signer_and_verifier();
    let mut signed = signer.sign(&sample_record()).unwrap();
    signed.signed_at = Some("2000-01-01T00:00:00.000Z".to_string());
    assert!(verifier.verify(&signed));
}

#[test]
fn wire_key_order_does_not_matter() {
    let (signer, verifier) = signer_and_verifier();
    let signed = signer.sign(&sample_record()).unwrap();

    let reordered = json!({
        "signature": signed.signature,
        "signed_at": signed.signed_at,
        "transfer_count": 0,
        "product_type": "desktop",
        "plan_type": "personal",
        "max_devices": 1,
        "license_key": "PERS-AAAA-BBBB-CCCC",
        "expires_at": "2099-01-01T00:00:00Z",
        "device_id": "d1",
        "activated_at": "2024-01-01T00:00:00Z",
    });

    assert!(verifier.verify_value(&reordered));
}

#[test]
fn unknown_fields_survive_and_stay_covered() {
    let (signer, verifier) = signer_and_verifier();
    let mut record = sample_record();
    record.extra.insert("features".to_string(), json!({"sync": true, "export": false}));
    let signed = signer.sign(&record).unwrap();

    let wire = serde_json::to_string(&signed).unwrap();
    let parsed: LicenseRecord = serde_json::from_str(&wire).unwrap();
    assert!(verifier.verify(&parsed));

    let mut value: serde_json::Value = serde_json::from_str(&wire).unwrap();
    value["features"]["export"] = json!(true);
    assert!(!verifier.verify_value(&value));
}

#[test]
fn other_public_key_rejects() {
    let (signer, _) = signer_and_verifier();
    let (_, other_verifier) = signer_and_verifier();

    let signed = signer.sign(&sample_record()).unwrap();
    assert!(!other_verifier.verify(&signed));
}

#[test]
fn legacy_hmac_signatures() {
    let signer = LicenseSigner::with_shared_secret(b"shared-secret", SigningStats::new());
    let signed = signer.sign(&sample_record()).unwrap();

    assert_eq!(signer.mode(), SigningMode::LegacyHmac);
    assert_eq!(signed.signature.as_deref().map(str::len), Some(64));
    assert!(signer.verify_legacy(&signed));

    // The client only checks shape.
    let client = LicenseVerifier::new(None, Environment::Production);
    let mut forged = signed.clone();
    forged.max_devices = 99;
    assert!(client.verify(&forged));
    assert!(!signer.verify_legacy(&forged));

    let wrong = LicenseSigner::with_shared_secret(b"other-secret", SigningStats::new());
    assert!(!wrong.verify_legacy(&signed));
}

#[test]
fn unsigned_output_is_rejected_in_production() {
    let signer = LicenseSigner::unsigned(SigningStats::new());
    let record = signer.sign(&sample_record()).unwrap();

    assert!(record.signature.is_none());
    assert!(!record.is_signed());
    assert!(!LicenseVerifier::new(None, Environment::Production).verify(&record));
    assert!(LicenseVerifier::new(None, Environment::Development).verify(&record));
}

#[test]
fn default_verifier_rejects_stripped_signature() {
    let pair = generate_key_pair().unwrap();
    let signer = LicenseSigner::with_private_key(&pair.private_key, SigningStats::new()).unwrap();
    let verifier = LicenseVerifier::from_config(&VerificationConfig {
        public_key: Some(pair.public_key.clone()),
        ..Default::default()
    })
    .unwrap();

    let mut stripped = signer.sign(&sample_record()).unwrap();
    stripped.signature = None;
    stripped.max_devices = 999;

    assert!(!verifier.verify(&stripped));
    assert!(!verifier.verify_value(&stripped.to_value().unwrap()));
}

#[test]
fn non_string_signature_is_rejected_outside_production() {
    let verifier = LicenseVerifier::new(None, Environment::Development);
    let mut value = sample_record().to_value().unwrap();
    value["max_devices"] = json!(999);

    for signature in [json!(12345), json!({"der": "3045"}), json!(["00"])] {
        value["signature"] = signature;
        assert!(!verifier.verify_value(&value));
    }
}

#[test]
fn stats_count_each_mode() {
    let stats = SigningStats::new();
    let pair = generate_key_pair().unwrap();

    let ecdsa = LicenseSigner::with_private_key(&pair.private_key, stats.clone()).unwrap();
    let hmac = LicenseSigner::with_shared_secret(b"s", stats.clone());
    let none = LicenseSigner::unsigned(stats.clone());

    ecdsa.sign(&sample_record()).unwrap();
    ecdsa.sign(&sample_record()).unwrap();
    hmac.sign(&sample_record()).unwrap();
    none.sign(&sample_record()).unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(ecdsa.stats().snapshot(), snapshot);
    assert_eq!(snapshot.asymmetric, 2);
    assert_eq!(snapshot.legacy, 1);
    assert_eq!(snapshot.unsigned, 1);
}

#[tokio::test]
async fn async_verification_matches_sync() {
    let (signer, verifier) = signer_and_verifier();
    let signed = signer.sign(&sample_record()).unwrap();
    assert!(verifier.verify_async(&signed).await);

    let mut tampered = signed;
    tampered.device_id = "d2".to_string();
    assert!(!verifier.verify_async(&tampered).await);
}

#[test]
fn trial_records_sign_and_verify() {
    let (signer, verifier) = signer_and_verifier();
    let mut trial = LicenseRecord::trial("TRIAL-AAAA-BBBB-CCCC", "d1", "trial", 1);
    trial.start_date = Some("2024-01-01T00:00:00Z".to_string());
    let signed = signer.sign(&trial).unwrap();

    assert!(signed.is_trial());
    assert!(verifier.verify(&signed));
}
