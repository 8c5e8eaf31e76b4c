//! USB capability layer.
//!
//! The driver consumes a narrow slice of the USB host API: device
//! enumeration, descriptor reads, open, kernel-driver auto-detach,
//! interface claim/release, string descriptors, and interrupt OUT
//! transfers. The [`UsbBackend`]/[`UsbHandle`] traits capture exactly
//! that slice; [`RusbBackend`] implements it over libusb and
//! [`mock::MockUsb`] replays scripted devices for tests.

pub mod backend;
pub mod mock;

pub use backend::{
    DeviceDescription, RusbBackend, RusbHandle, UsbBackend, UsbError, UsbHandle, map_rusb_error,
};
