//! aoa-pilot: drive an Android handset's UI over USB as a virtual HID
//! touch pointer and keyboard.
//!
//! Layers, bottom-up:
//!
//! - [`hid`]: report layouts and descriptors for the two virtual peripherals
//! - [`usb`]: the accessory-mode [`Transport`](usb::Transport) that carries them
//! - [`gesture`]: taps, swipes and key presses in screen pixels
//! - [`screen`]: screen-off detection from frame brightness
//! - [`navigator`]: the closed loop that walks a setup wizard to completion
//! - [`bridge`]: screenshots, boot probe, text input and the vision oracle
//!
//! Everything above [`usb::aoa`] is host-testable without a device; see
//! [`testing`] for the in-memory doubles.
//!
//! Usage: `cargo test` for the logic, `cargo run --features usb -- --help`
//! for the CLI.

// ═══════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════

pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod gesture;
pub mod hid;
pub mod navigator;
pub mod screen;
pub mod testing;
pub mod usb;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════

pub use clock::{Clock, SystemClock};
pub use config::Settings;
pub use error::{Error, Result};
pub use gesture::{GestureSynthesizer, Point, ScreenGeometry, SwipeProfile};
pub use hid::{HidReport, PeripheralId, ReportDescriptor};
pub use navigator::{
    Collaborators, Completion, NavigationController, NavigationDecision, NavigatorConfig, Outcome,
    RunReport, State,
};
pub use screen::{is_screen_off, mean_brightness, Frame, PixelLayout};
pub use usb::Transport;
