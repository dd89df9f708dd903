use std::fs;
use std::process::Command;

use super::field_after;

/// Run a command and return its stdout, if it succeeded.
fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn displays_report() -> Option<String> {
    run("system_profiler", &["SPDisplaysDataType"])
}

/// Resolution lines of every attached display.
pub fn screen_geometry() -> Option<String> {
    let report = displays_report()?;
    let resolutions: Vec<&str> = report
        .lines()
        .filter(|l| l.trim_start().starts_with("Resolution:"))
        .filter_map(|l| l.split_once(':').map(|(_, v)| v.trim()))
        .collect();
    (!resolutions.is_empty()).then(|| resolutions.join(","))
}

pub fn color_depth() -> Option<String> {
    let report = displays_report()?;
    field_after(&report, "Pixel Depth", ':').map(str::to_string)
}

/// IANA zone from the `/etc/localtime` symlink target.
pub fn timezone() -> Option<String> {
    let target = fs::read_link("/etc/localtime").ok()?;
    let target = target.to_string_lossy();
    target
        .split_once("zoneinfo/")
        .map(|(_, zone)| zone.to_string())
}

/// Chipset model, vendor and Metal support of the first GPU.
pub fn graphics_adapter() -> Option<String> {
    let report = displays_report()?;
    let model = field_after(&report, "Chipset Model", ':')?;
    let vendor = field_after(&report, "Vendor", ':').unwrap_or("");
    let metal = field_after(&report, "Metal", ':').unwrap_or("");
    Some(format!("{vendor}~{model}~{metal}"))
}

/// Product version from `sw_vers`, e.g. `macOS 14.4`.
pub fn os_token() -> Option<String> {
    let version = run("sw_vers", &["-productVersion"])?;
    Some(format!("macOS {}", version.trim()))
}

/// Installed memory in whole GiB from `sysctl hw.memsize`.
pub fn device_memory() -> Option<String> {
    let bytes: u64 = run("sysctl", &["-n", "hw.memsize"])?.trim().parse().ok()?;
    Some(((bytes + (1 << 29)) >> 30).to_string())
}
