use keyward::fingerprint::DeviceFingerprint;
use keyward::hardware::{FixedSignals, Signal, SignalSource};
use keyward::{device_cipher, DeviceBoundCipher};

fn machine(screen: &str, gpu: &str) -> FixedSignals {
    FixedSignals::new()
        .with(Signal::Platform, "linux")
        .with(Signal::LogicalProcessors, "8")
        .with(Signal::ScreenGeometry, screen)
        .with(Signal::ColorDepth, "24")
        .with(Signal::Timezone, "Europe/Athens")
        .with(Signal::Language, "en-US")
        .with(Signal::GraphicsAdapter, gpu)
        .with(Signal::OsToken, "Ubuntu 24.04")
        .with(Signal::DeviceMemory, "16")
}

#[test]
fn fingerprint_is_stable_for_same_signals() {
    let a = DeviceFingerprint::compute_with(&machine("1920x1080", "Intel UHD 620"));
    let b = DeviceFingerprint::compute_with(&machine("1920x1080", "Intel UHD 620"));

    assert_eq!(a.as_str(), b.as_str());
    assert_eq!(a.as_str().len(), 64);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn native_fingerprint_is_stable_within_a_session() {
    assert_eq!(
        DeviceFingerprint::compute().as_str(),
        DeviceFingerprint::compute().as_str()
    );
}

#[test]
fn blob_decrypts_on_same_machine() {
    let fp = DeviceFingerprint::compute_with(&machine("1920x1080", "Intel UHD 620"));
    let blob = device_cipher::encrypt(br#"{"plan_type":"personal"}"#, &fp).unwrap();

    let again = DeviceFingerprint::compute_with(&machine("1920x1080", "Intel UHD 620"));
    assert_eq!(
        device_cipher::decrypt(&blob, &again).as_deref(),
        Some(br#"{"plan_type":"personal"}"#.as_slice())
    );
}

#[test]
fn blob_is_unreadable_on_another_machine() {
    let a = DeviceFingerprint::compute_with(&machine("1920x1080", "Intel UHD 620"));
    let b = DeviceFingerprint::compute_with(&machine("2560x1440", "NVIDIA RTX 3070"));
    assert_ne!(a.as_str(), b.as_str());

    let blob = DeviceBoundCipher::new(&a).encrypt(b"license").unwrap();
    assert!(DeviceBoundCipher::new(&b).decrypt(&blob).is_none());
}

#[test]
fn each_signal_changes_the_fingerprint() {
    let base = machine("1920x1080", "Intel UHD 620");
    let reference = DeviceFingerprint::compute_with(&base);

    for signal in Signal::ORDER {
        let changed = base.clone().with(signal, "something-else");
        assert_ne!(changed.read(signal), base.read(signal));

        let fp = DeviceFingerprint::compute_with(&changed);
        assert_ne!(fp.as_str(), reference.as_str(), "{} did not matter", signal.name());
    }
}

#[test]
fn tampered_blob_is_unreadable() {
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine;

    let fp = DeviceFingerprint::compute_with(&machine("1920x1080", "Intel UHD 620"));
    let cipher = DeviceBoundCipher::new(&fp);
    let blob = cipher.encrypt(b"license").unwrap();

    let mut raw = B64.decode(&blob).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    assert!(cipher.decrypt(&B64.encode(raw)).is_none());
}
