//! Error types for aoa-pilot.
//!
//! Timeouts and step exhaustion are not errors: the navigator reports them
//! as an [`Outcome`](crate::navigator::Outcome).

use std::path::PathBuf;

use thiserror::Error;

use crate::gesture::ScreenGeometry;
use crate::hid::PeripheralId;

/// Top-level error type used across the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// No USB device matches the requested vendor/product id.
    #[error("Android device not found (VID=0x{vendor_id:04X}, PID=0x{product_id:04X})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// A matching device is attached but could not be opened (permissions,
    /// interface claimed elsewhere), or the bus could not be enumerated.
    #[error("cannot open Android device (VID=0x{vendor_id:04X}, PID=0x{product_id:04X}): {reason}")]
    DeviceOpen {
        vendor_id: u16,
        product_id: u16,
        reason: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Gesture(#[from] GestureError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Screen geometry with a zero dimension.
    #[error("invalid screen geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("invalid navigator configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A vendor control transfer failed or was not acknowledged.
#[derive(Debug, Error)]
#[error("{request} for {peripheral} failed: {reason}")]
pub struct TransportError {
    /// Accessory request name (e.g. `SEND_HID_EVENT`).
    pub request: &'static str,
    pub peripheral: PeripheralId,
    pub reason: String,
}

impl TransportError {
    pub fn new(request: &'static str, peripheral: PeripheralId, reason: impl Into<String>) -> Self {
        Self {
            request,
            peripheral,
            reason: reason.into(),
        }
    }
}

/// Failures raised by the gesture synthesizer.
#[derive(Debug, Error)]
pub enum GestureError {
    /// Caller passed a point outside `[0, width) x [0, height)`.
    #[error("point ({x}, {y}) is outside the {geometry} screen")]
    OutOfBounds {
        x: u32,
        y: u32,
        geometry: ScreenGeometry,
    },

    #[error("swipe needs at least one step")]
    InvalidSteps,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The decision oracle could not produce any decision.
///
/// Malformed model output is not an error; the oracle substitutes the safe
/// default decision instead.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("vision request failed: {0}")]
    Request(String),

    #[error("vision response has no message content: {0}")]
    Envelope(String),

    #[error("frame encoding failed: {0}")]
    Encode(String),
}

/// The device text-injection command failed.
#[derive(Debug, Error)]
pub enum TextInputError {
    #[error("device control channel is not connected")]
    NotConnected,

    #[error("text input command failed: {0}")]
    Command(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
