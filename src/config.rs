//! Tunable constants and the on-disk settings file.
//!
//! Timing and protocol defaults live here as constants so they can be
//! tuned in one place. The CLI reads a TOML [`Settings`] file whose
//! fields all default to these values.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::hid::PeripheralId;
use crate::navigator::NavigatorConfig;

// USB

/// Google's accessory-mode vendor id.
pub const AOA_VENDOR_ID: u16 = 0x18D1;
/// Accessory-mode product id (accessory + ADB).
pub const AOA_PRODUCT_ID: u16 = 0x2D01;

pub const DEFAULT_KEYBOARD_ID: u16 = 1;
pub const DEFAULT_POINTER_ID: u16 = 2;

// Screen

pub const DEFAULT_SCREEN_WIDTH: u32 = 1080;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 2400;

/// Mean frame brightness (0..=255) below which the display counts as off.
/// Dark-but-on content such as video can fall under it.
pub const SCREEN_OFF_THRESHOLD: f64 = 10.0;

// Gestures

/// Hold time between press and release of a tap.
pub const TAP_SETTLE: Duration = Duration::from_millis(100);

/// Hold time between key down and key up.
pub const KEY_HOLD: Duration = Duration::from_millis(50);

pub const SWIPE_STEPS: u32 = 10;
pub const SWIPE_DURATION: Duration = Duration::from_millis(300);

/// Distance (px) from the screen centre to each end of a canonical swipe.
pub const SWIPE_THROW: u32 = 400;

/// Axis units the wake nudge moves the pointer.
pub const WAKE_NUDGE: u16 = 50;

// Navigator

pub const DEFAULT_MAX_STEPS: u32 = 30;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Consecutive screen-off detections answered with a pointer nudge before
/// escalating to the power key.
pub const ESCALATION_THRESHOLD: u32 = 2;

/// Backoff after the frame source returned nothing.
pub const CAPTURE_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Settle time after a wake action.
pub const WAKE_SETTLE: Duration = Duration::from_secs(2);

/// Pause between navigator iterations.
pub const STEP_PACING: Duration = Duration::from_secs(1);

/// Wait used when the oracle asks to wait without saying how long.
pub const DEFAULT_WAIT_SECS: f64 = 3.0;

/// Tap target when the oracle omits coordinates.
pub const DEFAULT_TAP_X: i64 = 540;
pub const DEFAULT_TAP_Y: i64 = 960;

// Device bridge

/// Limit for `adb shell`, `getprop` and `adb devices`.
pub const ADB_SHELL_TIMEOUT: Duration = Duration::from_secs(30);
/// Limit for one `screencap`; a stalled capture counts as a failed one.
pub const ADB_SCREENCAP_TIMEOUT: Duration = Duration::from_secs(10);

// Oracle

pub const DEFAULT_ORACLE_URL: &str = "http://localhost:11434";
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

// ═══════════════════════════════════════════════════════════════════════════
// Settings file
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub usb: UsbSettings,
    pub screen: ScreenSettings,
    pub navigator: NavigatorSettings,
    pub adb: AdbSettings,
    pub oracle: OracleSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsbSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    pub pointer_id: u16,
    pub keyboard_id: u16,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            vendor_id: AOA_VENDOR_ID,
            product_id: AOA_PRODUCT_ID,
            pointer_id: DEFAULT_POINTER_ID,
            keyboard_id: DEFAULT_KEYBOARD_ID,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_SCREEN_WIDTH,
            height: DEFAULT_SCREEN_HEIGHT,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavigatorSettings {
    pub max_steps: u32,
    pub timeout_secs: u64,
    pub screen_off_threshold: f64,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            screen_off_threshold: SCREEN_OFF_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdbSettings {
    pub path: String,
    pub serial: Option<String>,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            path: "adb".into(),
            serial: None,
        }
    }
}

/// Wire dialect of the vision endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    /// Any `/v1/chat/completions` compatible server.
    OpenAi,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSettings {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            base_url: DEFAULT_ORACLE_URL.into(),
            model: String::new(),
            api_key: None,
            timeout_secs: DEFAULT_ORACLE_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    /// Read, expand `${VAR}` references, and parse a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        Self::parse_with(text, origin, |name| std::env::var(name).ok())
    }

    /// Parse with `${NAME}` resolved by `lookup`. Values are escaped for
    /// a TOML basic string, so references belong inside `"..."`.
    pub fn parse_with(
        text: &str,
        origin: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_env(text, |name| lookup(name).map(|v| escape_basic_string(&v)));
        toml::from_str(&expanded).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Navigator parameters; validated when the controller is built.
    pub fn navigator_config(&self) -> NavigatorConfig {
        NavigatorConfig {
            screen_width: self.screen.width,
            screen_height: self.screen.height,
            pointer_id: PeripheralId(self.usb.pointer_id),
            keyboard_id: PeripheralId(self.usb.keyboard_id),
            max_steps: self.navigator.max_steps,
            timeout: Duration::from_secs(self.navigator.timeout_secs),
            screen_off_threshold: self.navigator.screen_off_threshold,
            label: self
                .adb
                .serial
                .clone()
                .unwrap_or_else(|| "usb".to_string()),
        }
    }
}

/// Escape `value` for the inside of a TOML basic (double-quoted) string.
pub fn escape_basic_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Replace `${NAME}` with `lookup(NAME)`. Unknown names are left as-is.
pub fn expand_env(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
