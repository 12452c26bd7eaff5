//! Collaborators the navigator consumes but does not own.
//!
//! - [`FrameSource`]: screenshots
//! - [`BootProbe`]: "device control channel up and boot completed"
//! - [`DecisionOracle`]: vision judgement of a frame
//! - [`TextInput`]: the device's own text-injection command
//!
//! [`adb`] implements the device-side three over the `adb` executable,
//! [`vision`] implements the oracle over an HTTP vision model.

pub mod adb;
pub mod vision;

use crate::error::{OracleError, TextInputError};
use crate::navigator::NavigationDecision;
use crate::screen::Frame;

pub trait FrameSource {
    /// Grab the current screen. `None` when no frame is available right
    /// now; never an error.
    fn capture(&mut self) -> Option<Frame>;
}

pub trait BootProbe {
    fn is_booted(&self) -> bool;
}

pub trait DecisionOracle {
    /// Judge `frame`.
    ///
    /// Contract: an upstream reply that cannot be parsed yields
    /// [`NavigationDecision::fallback`]. `Err` is reserved for failing to
    /// obtain any reply, and aborts the navigator run.
    fn decide(&mut self, frame: &Frame) -> Result<NavigationDecision, OracleError>;
}

pub trait TextInput {
    fn send_text(&self, text: &str) -> Result<(), TextInputError>;
}
