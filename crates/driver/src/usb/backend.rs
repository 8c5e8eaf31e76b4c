//! USB backend traits and the rusb implementation.
//!
//! Sessions and discovery only ever talk to [`UsbBackend`] and
//! [`UsbHandle`], so the whole driver can be exercised against a
//! scripted backend without hardware attached.

use std::time::Duration;

use rusb::UsbContext;
use thiserror::Error;
use tracing::debug;

/// Cached descriptor fields for one device on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescription {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub device_address: u8,
}

/// USB status taxonomy, mirroring the libusb error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    /// Transfer timed out.
    #[error("transfer timed out")]
    Timeout,
    /// Endpoint stalled (protocol error).
    #[error("endpoint stalled")]
    Pipe,
    /// Device was disconnected.
    #[error("device has been disconnected")]
    NoDevice,
    /// Device or entity not found.
    #[error("entity not found")]
    NotFound,
    /// Resource busy, typically a contended interface.
    #[error("resource busy")]
    Busy,
    /// Buffer overflow.
    #[error("buffer overflow")]
    Overflow,
    /// I/O error.
    #[error("input/output error")]
    Io,
    /// Invalid parameter.
    #[error("invalid parameter")]
    InvalidParam,
    /// Access denied (permissions).
    #[error("access denied (insufficient permissions)")]
    Access,
    /// Other error with message.
    #[error("{0}")]
    Other(String),
}

/// Host USB API consumed by discovery and sessions.
///
/// A backend owns the USB context; it must outlive every handle opened
/// through it.
pub trait UsbBackend {
    /// An enumerated, not yet opened device.
    type Device;
    /// An open device handle. Dropping it closes the device.
    type Handle: UsbHandle;

    /// Snapshot of the current device list.
    fn devices(&self) -> Result<Vec<Self::Device>, UsbError>;

    /// Read the descriptor fields used for identity matching.
    fn describe(&self, device: &Self::Device) -> Result<DeviceDescription, UsbError>;

    /// Open the device for transfers.
    fn open(&self, device: &Self::Device) -> Result<Self::Handle, UsbError>;
}

/// Operations on one opened device.
pub trait UsbHandle {
    /// Ask the USB stack to detach a bound kernel driver now and
    /// reattach it when the handle closes. Not supported on every
    /// platform.
    fn set_auto_detach_kernel_driver(&mut self, enabled: bool) -> Result<(), UsbError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError>;

    /// Read the serial number string descriptor. `Ok(None)` means the
    /// device does not report one.
    fn read_serial_string(&mut self) -> Result<Option<String>, UsbError>;

    /// One interrupt transfer; returns the number of bytes the device
    /// accepted.
    fn write_interrupt(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;
}

/// Production backend over a libusb context.
pub struct RusbBackend {
    context: rusb::Context,
}

impl RusbBackend {
    /// Initialize a fresh libusb context.
    pub fn new() -> Result<Self, UsbError> {
        let context = rusb::Context::new().map_err(map_rusb_error)?;
        Ok(Self { context })
    }
}

impl UsbBackend for RusbBackend {
    type Device = rusb::Device<rusb::Context>;
    type Handle = RusbHandle;

    fn devices(&self) -> Result<Vec<Self::Device>, UsbError> {
        let list = self.context.devices().map_err(map_rusb_error)?;
        Ok(list.iter().collect())
    }

    fn describe(&self, device: &Self::Device) -> Result<DeviceDescription, UsbError> {
        let descriptor = device.device_descriptor().map_err(map_rusb_error)?;
        Ok(DeviceDescription {
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            bus_number: device.bus_number(),
            device_address: device.address(),
        })
    }

    fn open(&self, device: &Self::Device) -> Result<Self::Handle, UsbError> {
        let descriptor = device.device_descriptor().map_err(map_rusb_error)?;
        let handle = device.open().map_err(map_rusb_error)?;
        debug!(
            "Opened device at bus {} addr {}",
            device.bus_number(),
            device.address()
        );

        Ok(RusbHandle {
            handle,
            serial_index: descriptor.serial_number_string_index(),
        })
    }
}

/// Open rusb handle plus the descriptor index needed for the serial
/// string read.
pub struct RusbHandle {
    handle: rusb::DeviceHandle<rusb::Context>,
    serial_index: Option<u8>,
}

impl UsbHandle for RusbHandle {
    fn set_auto_detach_kernel_driver(&mut self, enabled: bool) -> Result<(), UsbError> {
        self.handle
            .set_auto_detach_kernel_driver(enabled)
            .map_err(map_rusb_error)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.handle.claim_interface(interface).map_err(map_rusb_error)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.handle
            .release_interface(interface)
            .map_err(map_rusb_error)
    }

    fn read_serial_string(&mut self) -> Result<Option<String>, UsbError> {
        let Some(index) = self.serial_index else {
            return Ok(None);
        };

        match self.handle.read_string_descriptor_ascii(index) {
            Ok(serial) => Ok(Some(serial)),
            Err(e) => Err(map_rusb_error(e)),
        }
    }

    fn write_interrupt(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        self.handle
            .write_interrupt(endpoint, data, timeout)
            .map_err(map_rusb_error)
    }
}

/// Map rusb::Error to the backend error taxonomy.
pub fn map_rusb_error(err: rusb::Error) -> UsbError {
    match err {
        rusb::Error::Timeout => UsbError::Timeout,
        rusb::Error::Pipe => UsbError::Pipe,
        rusb::Error::NoDevice => UsbError::NoDevice,
        rusb::Error::NotFound => UsbError::NotFound,
        rusb::Error::Busy => UsbError::Busy,
        rusb::Error::Overflow => UsbError::Overflow,
        rusb::Error::Io => UsbError::Io,
        rusb::Error::InvalidParam => UsbError::InvalidParam,
        rusb::Error::Access => UsbError::Access,
        _ => UsbError::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), UsbError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Busy), UsbError::Busy);
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), UsbError::NoDevice);
        assert_eq!(map_rusb_error(rusb::Error::Access), UsbError::Access);
    }

    #[test]
    fn test_unmapped_errors_keep_their_message() {
        let mapped = map_rusb_error(rusb::Error::NotSupported);
        assert!(matches!(mapped, UsbError::Other(_)));
    }
}
