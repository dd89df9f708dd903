use std::process::Command;

use super::field_after;

/// Query one WMI class with `wmic ... get /value`, returning `Key=Value` lines.
fn wmic(class: &str, fields: &str) -> Option<String> {
    let output = Command::new("wmic")
        .args(["path", class, "get", fields, "/value"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).replace('\r', ""))
}

pub fn screen_geometry() -> Option<String> {
    let out = wmic(
        "Win32_VideoController",
        "CurrentHorizontalResolution,CurrentVerticalResolution",
    )?;
    let width = field_after(&out, "CurrentHorizontalResolution", '=')?;
    let height = field_after(&out, "CurrentVerticalResolution", '=')?;
    Some(format!("{width}x{height}"))
}

pub fn color_depth() -> Option<String> {
    let out = wmic("Win32_VideoController", "CurrentBitsPerPixel")?;
    field_after(&out, "CurrentBitsPerPixel", '=').map(str::to_string)
}

/// Windows zone id from `tzutil /g`, e.g. `GTB Standard Time`.
pub fn timezone() -> Option<String> {
    let output = Command::new("tzutil").arg("/g").output().ok()?;
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn graphics_adapter() -> Option<String> {
    let out = wmic(
        "Win32_VideoController",
        "AdapterCompatibility,Name,DriverVersion",
    )?;
    let vendor = field_after(&out, "AdapterCompatibility", '=').unwrap_or("");
    let name = field_after(&out, "Name", '=')?;
    let driver = field_after(&out, "DriverVersion", '=').unwrap_or("");
    Some(format!("{vendor}~{name}~{driver}"))
}

/// OS build string, e.g. `10.0.22631`.
pub fn os_token() -> Option<String> {
    let out = wmic("Win32_OperatingSystem", "Version")?;
    field_after(&out, "Version", '=').map(|v| format!("Windows {v}"))
}

/// Installed memory in whole GiB.
pub fn device_memory() -> Option<String> {
    let out = wmic("Win32_ComputerSystem", "TotalPhysicalMemory")?;
    let bytes: u64 = field_after(&out, "TotalPhysicalMemory", '=')?.parse().ok()?;
    Some(((bytes + (1 << 29)) >> 30).to_string())
}
