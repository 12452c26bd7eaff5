//! Accessory-mode USB transport.
//!
//! With the handset in Android Open Accessory mode the host can register
//! virtual HID peripherals on the device through four vendor control
//! requests (AOA v2):
//!
//! | Request               | Code | wValue        | wIndex            | Data        |
//! |-----------------------|------|---------------|-------------------|-------------|
//! | `REGISTER_HID`        | 54   | peripheral id | descriptor length | -           |
//! | `UNREGISTER_HID`      | 55   | peripheral id | 0                 | -           |
//! | `SET_HID_REPORT_DESC` | 56   | peripheral id | offset            | descriptor  |
//! | `SEND_HID_EVENT`      | 57   | peripheral id | 0                 | report      |
//!
//! [`Transport`] is the seam between this wire protocol and everything
//! above it; the gesture and navigation layers only ever see the trait.

#[cfg(feature = "usb")]
pub mod aoa;

use core::fmt::Display;

use crate::error::{Error, TransportError};
use crate::hid::{PeripheralId, ReportDescriptor};

pub const ACCESSORY_REGISTER_HID: u8 = 54;
pub const ACCESSORY_UNREGISTER_HID: u8 = 55;
pub const ACCESSORY_SET_HID_REPORT_DESC: u8 = 56;
pub const ACCESSORY_SEND_HID_EVENT: u8 = 57;

/// bmRequestType for host-to-device, vendor, device recipient.
pub const VENDOR_OUT: u8 = 0x40;

/// Raw accessory HID operations. No business logic, no retries.
pub trait Transport {
    /// Declare `id` with the descriptor's length, then upload the descriptor.
    ///
    /// A failure leaves the registration state unknown; callers must retry
    /// the whole registration.
    fn register(&mut self, id: PeripheralId, descriptor: ReportDescriptor)
        -> Result<(), TransportError>;

    /// Tear down `id`. Callers treat failures as non-fatal.
    fn unregister(&mut self, id: PeripheralId) -> Result<(), TransportError>;

    /// Push one input report. Hot path: must not sleep.
    fn send_report(&mut self, id: PeripheralId, report: &[u8]) -> Result<(), TransportError>;

    /// Release the device handle. Idempotent.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn register(
        &mut self,
        id: PeripheralId,
        descriptor: ReportDescriptor,
    ) -> Result<(), TransportError> {
        (**self).register(id, descriptor)
    }

    fn unregister(&mut self, id: PeripheralId) -> Result<(), TransportError> {
        (**self).unregister(id)
    }

    fn send_report(&mut self, id: PeripheralId, report: &[u8]) -> Result<(), TransportError> {
        (**self).send_report(id, report)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Open the first enumerated device whose ids match.
///
/// Later matches are tried when an earlier one fails to open. No match at
/// all is [`Error::DeviceNotFound`]; matches that all fail to open are
/// [`Error::DeviceOpen`] carrying the last failure.
#[cfg_attr(not(feature = "usb"), allow(dead_code))]
pub(crate) fn open_first_match<D, H, E: Display>(
    candidates: impl IntoIterator<Item = (u16, u16, D)>,
    vendor_id: u16,
    product_id: u16,
    mut open: impl FnMut(D) -> Result<H, E>,
) -> Result<H, Error> {
    let mut last_failure = None;
    for (vid, pid, device) in candidates {
        if vid != vendor_id || pid != product_id {
            continue;
        }
        match open(device) {
            Ok(handle) => return Ok(handle),
            Err(e) => last_failure = Some(e.to_string()),
        }
    }
    match last_failure {
        Some(reason) => Err(Error::DeviceOpen {
            vendor_id,
            product_id,
            reason,
        }),
        None => Err(Error::DeviceNotFound {
            vendor_id,
            product_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VID: u16 = 0x18D1;
    const PID: u16 = 0x2D01;

    fn open_named(name: &'static str) -> Result<&'static str, String> {
        match name {
            "busy" => Err("Resource busy".to_string()),
            "denied" => Err("Access denied (insufficient permissions)".to_string()),
            ok => Ok(ok),
        }
    }

    #[test]
    fn opens_matching_device() {
        let devices = [(0x046D, 0xC52B, "mouse"), (VID, PID, "phone")];
        assert_eq!(open_first_match(devices, VID, PID, open_named).unwrap(), "phone");
    }

    #[test]
    fn no_match_is_not_found() {
        let devices = [(0x046D, 0xC52B, "mouse"), (VID, 0x4EE7, "phone-mtp")];
        let err = open_first_match(devices, VID, PID, open_named).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { vendor_id: VID, product_id: PID }));
    }

    #[test]
    fn open_failure_is_distinct_from_not_found() {
        let devices = [(VID, PID, "denied")];
        let err = open_first_match(devices, VID, PID, open_named).unwrap_err();
        match err {
            Error::DeviceOpen { reason, .. } => {
                assert!(reason.contains("insufficient permissions"))
            }
            other => panic!("expected DeviceOpen, got {other:?}"),
        }
    }

    #[test]
    fn later_match_tried_after_open_failure() {
        let devices = [(VID, PID, "busy"), (VID, PID, "second")];
        assert_eq!(open_first_match(devices, VID, PID, open_named).unwrap(), "second");
    }
}
