//! Driver error types

use thiserror::Error;

use crate::usb::UsbError;

/// Errors surfaced by discovery and session operations.
///
/// Transport failures on individual packets are deliberately absent
/// from this taxonomy: the wire protocol is unacknowledged, so a
/// dropped packet is logged and swallowed rather than returned to the
/// caller.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The USB subsystem reported an error.
    #[error("USB error: {0}")]
    Usb(#[from] UsbError),

    /// The interface stayed busy through every claim attempt, usually
    /// because a conflicting legacy driver is still bound to the
    /// device.
    #[error(
        "interface still busy after {attempts} claim attempts; install a generic USB (WinUSB) driver for the device"
    )]
    InterfaceBusy { attempts: u32 },

    /// Operation on a session that never finished initializing.
    #[error("device session is not initialized")]
    NotReady,

    /// A zone index outside the device's zone list.
    #[error("zone index {index} out of range (device has {count} zones)")]
    InvalidZone { index: usize, count: usize },

    /// Protocol-level input validation failure.
    #[error(transparent)]
    Protocol(#[from] ambx_protocol::ProtocolError),
}

/// Type alias for driver results.
pub type Result<T> = std::result::Result<T, DriverError>;
