//! Driver for the Philips amBX Gaming lights.
//!
//! Discovers amBX units on the USB bus, claims their control
//! interface, and drives the five lighting zones over the vendor
//! interrupt-transfer protocol defined in `ambx-protocol`.
//!
//! The USB host API is consumed through the [`usb::UsbBackend`] trait:
//! [`usb::RusbBackend`] is the libusb-based production implementation,
//! and [`usb::mock::MockUsb`] a scripted stand-in that lets the whole
//! session lifecycle run under test without hardware.

pub mod discovery;
pub mod error;
pub mod rgb;
pub mod session;
pub mod usb;

pub use discovery::discover;
pub use error::{DriverError, Result};
pub use rgb::{AmbxLights, ZoneLighting};
pub use session::AmbxSession;
