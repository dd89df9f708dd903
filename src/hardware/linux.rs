use std::fs;
use std::path::Path;

use super::field_after;

const DRM_CLASS: &str = "/sys/class/drm";

/// Connected DRM connectors, sorted so the order does not depend on
/// directory iteration.
fn connected_connectors() -> Vec<std::path::PathBuf> {
    let Ok(entries) = fs::read_dir(DRM_CLASS) else {
        return Vec::new();
    };
    let mut connectors: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            fs::read_to_string(p.join("status"))
                .map(|s| s.trim() == "connected")
                .unwrap_or(false)
        })
        .collect();
    connectors.sort();
    connectors
}

/// Preferred mode of every connected display, e.g. `1920x1080,2560x1440`.
pub fn screen_geometry() -> Option<String> {
    let modes: Vec<String> = connected_connectors()
        .iter()
        .filter_map(|p| fs::read_to_string(p.join("modes")).ok())
        .filter_map(|m| m.lines().next().map(str::to_string))
        .collect();
    (!modes.is_empty()).then(|| modes.join(","))
}

/// The kernel does not expose framebuffer depth through DRM sysfs; fall back
/// to the legacy fbdev attribute.
pub fn color_depth() -> Option<String> {
    fs::read_to_string("/sys/class/graphics/fb0/bits_per_pixel").ok()
}

/// IANA zone from `/etc/timezone` or the `/etc/localtime` symlink target.
pub fn timezone() -> Option<String> {
    if let Ok(tz) = fs::read_to_string("/etc/timezone") {
        let tz = tz.trim();
        if !tz.is_empty() {
            return Some(tz.to_string());
        }
    }
    let target = fs::read_link("/etc/localtime").ok()?;
    let target = target.to_string_lossy();
    target
        .split_once("zoneinfo/")
        .map(|(_, zone)| zone.to_string())
}

/// PCI vendor/device ids and kernel driver of the first GPU.
pub fn graphics_adapter() -> Option<String> {
    let mut cards: Vec<_> = fs::read_dir(DRM_CLASS)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("card") && !n.contains('-'))
        })
        .collect();
    cards.sort();

    let device = cards.first()?.join("device");
    let read = |name: &str| {
        fs::read_to_string(device.join(name))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let driver = fs::read_link(device.join("driver"))
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();

    Some(format!("{}~{}~{}", read("vendor"), read("device"), driver))
}

/// Distribution id and version from os-release, e.g. `ubuntu 22.04`.
pub fn os_token() -> Option<String> {
    let release = ["/etc/os-release", "/usr/lib/os-release"]
        .iter()
        .find_map(|p| fs::read_to_string(Path::new(p)).ok())?;

    let id = release
        .lines()
        .find(|l| l.starts_with("ID="))
        .map(|l| l.trim_start_matches("ID=").trim_matches('"').to_string())?;
    let version = field_after(&release, "VERSION_ID", '=').unwrap_or("");
    Some(format!("{id} {version}"))
}

/// Installed memory in whole GiB from `/proc/meminfo`.
pub fn device_memory() -> Option<String> {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    let kib: u64 = field_after(&meminfo, "MemTotal", ':')?
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(((kib + (1 << 19)) >> 20).to_string())
}
