//! The oracle's per-iteration verdict and its JSON wire form.
//!
//! The vision model answers with
//!
//! ```json
//! {"screen_state": "wifi_setup", "completed": false,
//!  "action": {"type": "tap", "x": 540, "y": 1200, "text": "",
//!             "direction": "up", "wait_seconds": 0},
//!  "confidence": 0.95}
//! ```
//!
//! Every field is optional. A reply that cannot be parsed at all becomes
//! [`NavigationDecision::fallback`] instead of an error.

use log::warn;
use serde::Deserialize;

use crate::config;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    /// Case-insensitive; anything unrecognised is `Up`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "down" => SwipeDirection::Down,
            "left" => SwipeDirection::Left,
            "right" => SwipeDirection::Right,
            _ => SwipeDirection::Up,
        }
    }
}

/// What to do with the device this iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Tap at a screen pixel. May lie off-screen; the navigator clamps.
    Tap { x: i64, y: i64 },
    Swipe { direction: SwipeDirection },
    /// Text for the device's own text-injection command.
    Type { text: String },
    Wait { seconds: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NavigationDecision {
    pub action: Action,
    /// Model's label for the current screen.
    pub screen_state: String,
    pub completed: bool,
    pub confidence: f64,
}

impl NavigationDecision {
    /// Safe default: wait, not completed, unknown screen, zero confidence.
    pub fn fallback() -> Self {
        Self {
            action: Action::Wait {
                seconds: config::DEFAULT_WAIT_SECS,
            },
            screen_state: "unknown".into(),
            completed: false,
            confidence: 0.0,
        }
    }

    /// Strict parse of a model reply. Surrounding prose or markdown fences
    /// around the JSON object are tolerated.
    pub fn parse(response: &str) -> Result<Self, serde_json::Error> {
        let raw: RawDecision = serde_json::from_str(json_object(response))?;
        Ok(raw.into())
    }

    /// Parse, or fall back to [`NavigationDecision::fallback`] on any error.
    pub fn from_response(response: &str) -> Self {
        match Self::parse(response) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Failed to parse vision response ({e}): {response:?}");
                Self::fallback()
            }
        }
    }
}

/// The outermost `{ ... }` span of `text`, or `text` itself.
fn json_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDecision {
    screen_state: Option<String>,
    completed: Option<bool>,
    action: Option<RawAction>,
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAction {
    #[serde(rename = "type")]
    kind: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    text: Option<String>,
    direction: Option<String>,
    wait_seconds: Option<f64>,
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        let kind = raw.kind.as_deref().unwrap_or("wait").trim().to_ascii_lowercase();
        match kind.as_str() {
            "tap" => Action::Tap {
                x: raw.x.map_or(config::DEFAULT_TAP_X, |v| v.round() as i64),
                y: raw.y.map_or(config::DEFAULT_TAP_Y, |v| v.round() as i64),
            },
            "swipe" => Action::Swipe {
                direction: SwipeDirection::parse(raw.direction.as_deref().unwrap_or("up")),
            },
            "type" => Action::Type {
                text: raw.text.unwrap_or_default(),
            },
            "wait" => Action::Wait {
                seconds: raw.wait_seconds.unwrap_or(config::DEFAULT_WAIT_SECS),
            },
            other => {
                warn!("Unknown action type {other:?}, ignoring");
                Action::Wait { seconds: 0.0 }
            }
        }
    }
}

impl From<RawDecision> for NavigationDecision {
    fn from(raw: RawDecision) -> Self {
        Self {
            action: raw.action.unwrap_or_default().into(),
            screen_state: raw.screen_state.unwrap_or_else(|| "unknown".into()),
            completed: raw.completed.unwrap_or(false),
            confidence: raw.confidence.unwrap_or(0.0),
        }
    }
}
