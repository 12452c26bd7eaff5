//! Absolute-position pointer report for the AOA pointing peripheral.
//!
//! Layout (5 bytes):
//! ```text
//! Byte 0:   Button bitfield (bit 0 = primary contact)
//! Byte 1-2: X position, u16 little-endian, 0..=10000
//! Byte 3-4: Y position, u16 little-endian, 0..=10000
//! ```
//!
//! Android maps the logical range onto the full display, so the axis
//! values are fractions of the screen in units of 0.01%. The relative
//! boot-mouse range (-127..127) must not be used here.

/// Pointer report size in bytes.
pub const POINTER_REPORT_SIZE: usize = 5;

/// Upper bound of both absolute axes.
pub const AXIS_MAX: u16 = 10_000;

/// Primary button / touch contact bit.
pub const BUTTON_PRIMARY: u8 = 0x01;

/// Absolute pointer report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct PointerReport {
    /// Button bitfield (bit 0 = primary).
    pub buttons: u8,
    /// Absolute X in `0..=AXIS_MAX`.
    pub x: u16,
    /// Absolute Y in `0..=AXIS_MAX`.
    pub y: u16,
}

impl PointerReport {
    /// Report with the primary button held at `(x, y)`.
    pub const fn down(x: u16, y: u16) -> Self {
        Self {
            buttons: BUTTON_PRIMARY,
            x,
            y,
        }
    }

    /// Report with all buttons released at `(x, y)`.
    pub const fn up(x: u16, y: u16) -> Self {
        Self { buttons: 0, x, y }
    }

    pub fn is_pressed(&self) -> bool {
        self.buttons & BUTTON_PRIMARY != 0
    }

    /// Parse a report previously produced by [`PointerReport::serialize`].
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < POINTER_REPORT_SIZE {
            return None;
        }
        Some(Self {
            buttons: data[0],
            x: u16::from_le_bytes([data[1], data[2]]),
            y: u16::from_le_bytes([data[3], data[4]]),
        })
    }

    /// Serialise into a byte slice for the SEND_HID_EVENT payload.
    /// Returns the number of bytes written (0 if `buf` is too small).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < POINTER_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1..3].copy_from_slice(&self.x.to_le_bytes());
        buf[3..5].copy_from_slice(&self.y.to_le_bytes());
        POINTER_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; POINTER_REPORT_SIZE] {
        let mut buf = [0u8; POINTER_REPORT_SIZE];
        self.serialize(&mut buf);
        buf
    }
}

// HID report descriptor for a single-button absolute pointer

/// Report descriptor: 3 buttons (only bit 0 used) + two 16-bit absolute axes
/// with logical and physical range 0..10000.
pub const POINTER_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    //
    //   - Buttons (3 bits + 5 padding) -
    0x05, 0x09, //     Usage Page (Buttons)
    0x19, 0x01, //     Usage Minimum (Button 1)
    0x29, 0x03, //     Usage Maximum (Button 3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x01, //     Input (Constant) - padding
    //
    //   - X, Y absolute position -
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x16, 0x00, 0x00, // Logical Minimum (0)
    0x26, 0x10, 0x27, // Logical Maximum (10000)
    0x36, 0x00, 0x00, // Physical Minimum (0)
    0x46, 0x10, 0x27, // Physical Maximum (10000)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    //
    0xC0, //   End Collection (Physical)
    0xC0, // End Collection (Application)
];
