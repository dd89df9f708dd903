//! Environment signals that make up a device fingerprint.
//!
//! Each [`Signal`] is read independently by a [`SignalSource`]. A failed or
//! unsupported read yields `None`, which the fingerprint replaces with a
//! fixed sentinel. Nothing read here may depend on time, randomness or user
//! input.

use std::collections::BTreeMap;

#[cfg(target_os = "linux")]
#[path = "hardware/linux.rs"]
mod platform;

#[cfg(target_os = "macos")]
#[path = "hardware/macos.rs"]
mod platform;

#[cfg(target_os = "windows")]
#[path = "hardware/windows.rs"]
mod platform;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
mod platform {
    pub fn screen_geometry() -> Option<String> {
        None
    }
    pub fn color_depth() -> Option<String> {
        None
    }
    pub fn timezone() -> Option<String> {
        None
    }
    pub fn graphics_adapter() -> Option<String> {
        None
    }
    pub fn os_token() -> Option<String> {
        None
    }
    pub fn device_memory() -> Option<String> {
        None
    }
}

/// One machine characteristic that feeds the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    Platform,
    LogicalProcessors,
    ScreenGeometry,
    ColorDepth,
    Timezone,
    Language,
    GraphicsAdapter,
    OsToken,
    DeviceMemory,
    MaxTouchPoints,
}

impl Signal {
    /// Fixed hashing order. Changing it changes every fingerprint.
    pub const ORDER: [Signal; 10] = [
        Signal::Platform,
        Signal::LogicalProcessors,
        Signal::ScreenGeometry,
        Signal::ColorDepth,
        Signal::Timezone,
        Signal::Language,
        Signal::GraphicsAdapter,
        Signal::OsToken,
        Signal::DeviceMemory,
        Signal::MaxTouchPoints,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Signal::Platform => "platform",
            Signal::LogicalProcessors => "logical_processors",
            Signal::ScreenGeometry => "screen_geometry",
            Signal::ColorDepth => "color_depth",
            Signal::Timezone => "timezone",
            Signal::Language => "language",
            Signal::GraphicsAdapter => "graphics_adapter",
            Signal::OsToken => "os_token",
            Signal::DeviceMemory => "device_memory",
            Signal::MaxTouchPoints => "max_touch_points",
        }
    }
}

/// Something that can read fingerprint signals.
pub trait SignalSource: Send + Sync {
    fn read(&self, signal: Signal) -> Option<String>;
}

/// Reads signals from the host operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSignals;

impl SignalSource for NativeSignals {
    fn read(&self, signal: Signal) -> Option<String> {
        let value = match signal {
            Signal::Platform => Some(format!(
                "{}-{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
            Signal::LogicalProcessors => std::thread::available_parallelism()
                .ok()
                .map(|n| n.get().to_string()),
            Signal::ScreenGeometry => platform::screen_geometry(),
            Signal::ColorDepth => platform::color_depth(),
            Signal::Timezone => std::env::var("TZ")
                .ok()
                .map(|tz| tz.trim_start_matches(':').to_string())
                .filter(|tz| !tz.is_empty())
                .or_else(platform::timezone),
            Signal::Language => language_from_env(),
            Signal::GraphicsAdapter => platform::graphics_adapter(),
            Signal::OsToken => platform::os_token(),
            Signal::DeviceMemory => platform::device_memory(),
            // No portable API reports touch digitizers.
            Signal::MaxTouchPoints => None,
        };
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
}

/// Explicit signal values, for tests and for hosts that gather signals
/// themselves (for example a webview bridge).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedSignals {
    values: BTreeMap<Signal, String>,
}

impl FixedSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, signal: Signal, value: impl Into<String>) -> Self {
        self.values.insert(signal, value.into());
        self
    }
}

impl SignalSource for FixedSignals {
    fn read(&self, signal: Signal) -> Option<String> {
        self.values.get(&signal).cloned()
    }
}

/// UI language from the POSIX locale variables, without encoding suffix.
fn language_from_env() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG", "LANGUAGE"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty() && v != "C" && v != "POSIX")
        .map(|v| {
            let lang = v.split(['.', '@', ':']).next().unwrap_or(&v);
            lang.replace('_', "-")
        })
}

/// Extract a `key=value` style field from command output.
fn field_after<'a>(text: &'a str, key: &str, sep: char) -> Option<&'a str> {
    text.lines()
        .find(|line| line.trim_start().starts_with(key))
        .and_then(|line| line.split_once(sep))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}
