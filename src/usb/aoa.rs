//! libusb-backed [`Transport`] for a handset already in accessory mode.

use std::time::Duration;

use log::{debug, info};
use rusb::{DeviceHandle, GlobalContext};

use super::{
    open_first_match, Transport, ACCESSORY_REGISTER_HID, ACCESSORY_SEND_HID_EVENT,
    ACCESSORY_SET_HID_REPORT_DESC, ACCESSORY_UNREGISTER_HID, VENDOR_OUT,
};
use crate::error::{Error, TransportError};
use crate::hid::{PeripheralId, ReportDescriptor};

/// Control transfer timeout. A transfer that blocks this long is a failure.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Exclusive owner of the accessory device handle.
pub struct AoaTransport {
    handle: Option<DeviceHandle<GlobalContext>>,
    vendor_id: u16,
    product_id: u16,
}

impl AoaTransport {
    /// Enumerate attached USB devices and open the first one matching
    /// `vendor_id:product_id`.
    pub fn find_device(vendor_id: u16, product_id: u16) -> Result<Self, Error> {
        let devices = rusb::devices().map_err(|e| Error::DeviceOpen {
            vendor_id,
            product_id,
            reason: format!("cannot enumerate USB devices: {e}"),
        })?;
        let candidates = devices.iter().filter_map(|device| {
            let desc = device.device_descriptor().ok()?;
            Some((desc.vendor_id(), desc.product_id(), device))
        });
        let handle = open_first_match(candidates, vendor_id, product_id, |device| device.open())?;
        info!("Found device: VID=0x{vendor_id:04X} PID=0x{product_id:04X}");
        Ok(Self {
            handle: Some(handle),
            vendor_id,
            product_id,
        })
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    fn control(
        &self,
        name: &'static str,
        request: u8,
        id: PeripheralId,
        index: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| TransportError::new(name, id, "device handle closed"))?;
        let written = handle
            .write_control(VENDOR_OUT, request, id.0, index, data, CONTROL_TIMEOUT)
            .map_err(|e| TransportError::new(name, id, e.to_string()))?;
        if written != data.len() {
            return Err(TransportError::new(
                name,
                id,
                format!("short write: {written}/{} bytes", data.len()),
            ));
        }
        Ok(())
    }
}

impl Transport for AoaTransport {
    fn register(
        &mut self,
        id: PeripheralId,
        descriptor: ReportDescriptor,
    ) -> Result<(), TransportError> {
        let bytes = descriptor.bytes();
        let len = u16::try_from(bytes.len())
            .map_err(|_| TransportError::new("REGISTER_HID", id, "descriptor too long"))?;
        self.control("REGISTER_HID", ACCESSORY_REGISTER_HID, id, len, &[])?;
        self.control(
            "SET_HID_REPORT_DESC",
            ACCESSORY_SET_HID_REPORT_DESC,
            id,
            0,
            bytes,
        )?;
        info!("Registered {id} ({descriptor:?}), descriptor size={len}");
        Ok(())
    }

    fn unregister(&mut self, id: PeripheralId) -> Result<(), TransportError> {
        self.control("UNREGISTER_HID", ACCESSORY_UNREGISTER_HID, id, 0, &[])?;
        info!("Unregistered {id}");
        Ok(())
    }

    fn send_report(&mut self, id: PeripheralId, report: &[u8]) -> Result<(), TransportError> {
        self.control("SEND_HID_EVENT", ACCESSORY_SEND_HID_EVENT, id, 0, report)
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!(
                "Closed device VID=0x{:04X} PID=0x{:04X}",
                self.vendor_id, self.product_id
            );
        }
    }
}
