//! HID report types and descriptors for the two virtual peripherals
//! registered over the accessory link.

pub mod keyboard;
pub mod pointer;

#[cfg(test)]
mod tests;

use core::fmt;

use heapless::Vec;
use keyboard::{KeyboardReport, KEYBOARD_REPORT_DESCRIPTOR, KEYBOARD_REPORT_SIZE};
use pointer::{PointerReport, POINTER_REPORT_DESCRIPTOR, POINTER_REPORT_SIZE};

/// Largest input report either profile produces.
pub const MAX_REPORT_SIZE: usize = KEYBOARD_REPORT_SIZE;

/// Encoded report payload, sized for the largest profile.
pub type ReportBuf = Vec<u8, MAX_REPORT_SIZE>;

/// Identifier of a registered virtual HID peripheral.
///
/// Travels as `wValue` of every accessory HID request, so two peripherals
/// registered on the same link must never share an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeripheralId(pub u16);

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hid#{}", self.0)
    }
}

/// The fixed report descriptor profiles this crate registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportDescriptor {
    Pointer,
    Keyboard,
}

impl ReportDescriptor {
    pub fn bytes(self) -> &'static [u8] {
        match self {
            ReportDescriptor::Pointer => POINTER_REPORT_DESCRIPTOR,
            ReportDescriptor::Keyboard => KEYBOARD_REPORT_DESCRIPTOR,
        }
    }

    /// Size of one input report described by this descriptor.
    pub fn report_size(self) -> usize {
        match self {
            ReportDescriptor::Pointer => POINTER_REPORT_SIZE,
            ReportDescriptor::Keyboard => KEYBOARD_REPORT_SIZE,
        }
    }
}

/// A typed input report for either peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HidReport {
    Pointer(PointerReport),
    Keyboard(KeyboardReport),
}

impl HidReport {
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Pointer(p) => p.serialize(buf),
            HidReport::Keyboard(k) => k.serialize(buf),
        }
    }

    /// Encode into a fixed-capacity payload buffer.
    pub fn encode(&self) -> ReportBuf {
        let mut raw = [0u8; MAX_REPORT_SIZE];
        let n = self.serialize(&mut raw);
        // n never exceeds MAX_REPORT_SIZE, so this cannot fail.
        Vec::from_slice(&raw[..n]).unwrap_or_default()
    }

    /// Decode a payload according to the profile it was sent on.
    pub fn decode(profile: ReportDescriptor, data: &[u8]) -> Option<Self> {
        if data.len() != profile.report_size() {
            return None;
        }
        match profile {
            ReportDescriptor::Pointer => PointerReport::from_bytes(data).map(HidReport::Pointer),
            ReportDescriptor::Keyboard => {
                KeyboardReport::from_bytes(data).map(HidReport::Keyboard)
            }
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerReport> {
        match self {
            HidReport::Pointer(p) => Some(p),
            HidReport::Keyboard(_) => None,
        }
    }

    pub fn as_keyboard(&self) -> Option<&KeyboardReport> {
        match self {
            HidReport::Keyboard(k) => Some(k),
            HidReport::Pointer(_) => None,
        }
    }
}

impl From<PointerReport> for HidReport {
    fn from(report: PointerReport) -> Self {
        HidReport::Pointer(report)
    }
}

impl From<KeyboardReport> for HidReport {
    fn from(report: KeyboardReport) -> Self {
        HidReport::Keyboard(report)
    }
}
