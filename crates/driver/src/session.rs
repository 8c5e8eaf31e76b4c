//! Device session: open handle, claimed interface, protocol encoder.
//!
//! An [`AmbxSession`] owns exactly one opened amBX unit. Construction
//! claims the control interface and resets every zone to a known state;
//! teardown turns the lights off and releases the interface. In
//! between, color requests are encoded into interrupt-transfer frames
//! and shipped best-effort: the device never acknowledges a command, so
//! transient transfer failures are retried a few times and then dropped
//! with a log line instead of an error.

use std::thread;
use std::time::Duration;

use ambx_protocol::{Color, ENDPOINT_OUT, Zone, packet};
use tracing::{debug, error, info, warn};

use crate::error::{DriverError, Result};
use crate::usb::{UsbBackend, UsbError, UsbHandle};

/// Control interface number on the amBX unit.
const AMBX_INTERFACE: u8 = 0;

/// Claim attempts made before giving up on a contended interface.
const CLAIM_ATTEMPTS: u32 = 3;
/// Pause between claim attempts.
const CLAIM_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Interrupt transfer attempts per packet.
const SEND_ATTEMPTS: u32 = 3;
/// Per-attempt transfer timeout.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Pause after every color command. The device silently drops or
/// corrupts state under back-to-back unpaced writes, so this delay is
/// part of the wire contract, not tuning.
const PACKET_PACING: Duration = Duration::from_millis(2);

/// A live connection to one amBX unit.
///
/// The interface is claimed once during construction and held until the
/// session is dropped. A session is not internally synchronized:
/// operations take `&mut self` and one session must be driven from one
/// thread at a time. Sessions for distinct units are fully independent
/// and may run on separate threads.
pub struct AmbxSession<B: UsbBackend> {
    handle: Option<B::Handle>,
    location: String,
    serial: String,
    interface_claimed: bool,
    initialized: bool,
}

impl<B: UsbBackend> std::fmt::Debug for AmbxSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbxSession")
            .field("location", &self.location)
            .field("serial", &self.serial)
            .field("interface_claimed", &self.interface_claimed)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl<B: UsbBackend> AmbxSession<B> {
    /// Open a discovered device and bring it to a known state.
    ///
    /// Runs the full construction sequence: open, kernel-driver
    /// auto-detach, interface claim with bounded retry, serial string
    /// read, and an initial reset of every zone to black. A failure at
    /// any step yields an error, never a half-initialized session.
    pub fn open(backend: &B, device: &B::Device, location: String) -> Result<Self> {
        let mut handle = backend.open(device).map_err(|e| {
            warn!("Failed to open amBX device at {}: {}", location, e);
            e
        })?;

        // Let the USB stack detach a bound kernel driver and restore it
        // when the handle closes. Not supported on every platform.
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable at {}: {}", location, e);
        }

        claim_with_retry(&mut handle, &location)?;

        let serial = match handle.read_serial_string() {
            Ok(Some(serial)) => serial,
            Ok(None) => String::new(),
            Err(e) => {
                debug!("Could not read serial string at {}: {}", location, e);
                String::new()
            }
        };

        let mut session = Self {
            handle: Some(handle),
            location,
            serial,
            interface_claimed: true,
            initialized: true,
        };

        // Establish a known device state before the host issues its
        // first request.
        session.set_all_zones(Color::BLACK)?;

        info!("Initialized amBX session at {}", session.location);
        Ok(session)
    }

    /// Location string distinguishing this unit from other attached
    /// units.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Device serial number, empty when the unit does not report one.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Set one zone (or [`Zone::All`]) to a color.
    ///
    /// Transmits a single set-color frame, then paces before returning
    /// so consecutive calls cannot overrun the device's intake buffer.
    pub fn set_zone_color(&mut self, zone: Zone, color: Color) -> Result<()> {
        let frame = packet::set_color(zone, color);
        self.send_packet(&frame)?;
        thread::sleep(PACKET_PACING);
        Ok(())
    }

    /// Set every zone to the same color.
    ///
    /// Fans the color out to the five addressable zones in order; after
    /// a successful call every zone shows `color`.
    pub fn set_all_zones(&mut self, color: Color) -> Result<()> {
        for zone in Zone::ADDRESSABLE {
            self.set_zone_color(zone, color)?;
        }
        Ok(())
    }

    /// Apply `(zone, color)` pairs in order.
    ///
    /// There is no atomicity across zones: if a later update fails,
    /// earlier zones keep their new colors. The wire protocol offers no
    /// multi-zone transaction to build on.
    pub fn set_zone_colors(&mut self, updates: &[(Zone, Color)]) -> Result<()> {
        for &(zone, color) in updates {
            self.set_zone_color(zone, color)?;
        }
        Ok(())
    }

    /// Send one command frame to the OUT endpoint.
    ///
    /// Transient transport failures and short writes are retried with
    /// increasing backoff; once the attempts are exhausted the frame is
    /// dropped with a log line. Only an uninitialized session surfaces
    /// an error, and nothing is ever queued.
    fn send_packet(&mut self, frame: &[u8]) -> Result<()> {
        if !self.initialized || !self.interface_claimed {
            warn!("Dropping packet for {}: session not ready", self.location);
            return Err(DriverError::NotReady);
        }
        let handle = self.handle.as_mut().ok_or(DriverError::NotReady)?;

        for attempt in 1..=SEND_ATTEMPTS {
            match handle.write_interrupt(ENDPOINT_OUT, frame, SEND_TIMEOUT) {
                Ok(written) if written == frame.len() => return Ok(()),
                Ok(written) => {
                    warn!(
                        "Short write to {}: {}/{} bytes (attempt {}/{})",
                        self.location,
                        written,
                        frame.len(),
                        attempt,
                        SEND_ATTEMPTS
                    );
                }
                Err(e) => {
                    warn!(
                        "Interrupt transfer to {} failed: {} (attempt {}/{})",
                        self.location, e, attempt, SEND_ATTEMPTS
                    );
                }
            }

            if attempt < SEND_ATTEMPTS {
                thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
            }
        }

        error!(
            "Dropping packet for {} after {} attempts",
            self.location, SEND_ATTEMPTS
        );
        Ok(())
    }
}

impl<B: UsbBackend> Drop for AmbxSession<B> {
    /// Best-effort teardown: lights off, interface released, handle
    /// closed. This can run during process shutdown, so every failure
    /// is swallowed and each step is skipped if the one before it never
    /// succeeded.
    fn drop(&mut self) {
        if self.initialized {
            if let Err(e) = self.set_all_zones(Color::BLACK) {
                warn!("Could not turn off lights at {}: {}", self.location, e);
            }
            self.initialized = false;
        }

        if let Some(mut handle) = self.handle.take() {
            if self.interface_claimed {
                if let Err(e) = handle.release_interface(AMBX_INTERFACE) {
                    warn!("Could not release interface at {}: {}", self.location, e);
                }
                self.interface_claimed = false;
            }
            // The handle closes when dropped; the backend context
            // outlives it.
        }

        debug!("Closed amBX session at {}", self.location);
    }
}

/// Claim the control interface, retrying a contended claim.
///
/// A busy interface usually means the legacy Jungo/WinDriver driver is
/// still bound to the device.
fn claim_with_retry<H: UsbHandle>(handle: &mut H, location: &str) -> Result<()> {
    for attempt in 1..=CLAIM_ATTEMPTS {
        match handle.claim_interface(AMBX_INTERFACE) {
            Ok(()) => return Ok(()),
            Err(UsbError::Busy) => {
                warn!(
                    "Interface busy at {} - attempt {}/{}",
                    location, attempt, CLAIM_ATTEMPTS
                );
            }
            Err(e) => {
                warn!(
                    "Failed to claim interface at {}: {} (attempt {}/{})",
                    location, e, attempt, CLAIM_ATTEMPTS
                );
            }
        }

        if attempt < CLAIM_ATTEMPTS {
            thread::sleep(CLAIM_RETRY_DELAY);
        }
    }

    error!(
        "Could not claim interface at {} after {} attempts; a conflicting driver may hold the device - install a generic USB (WinUSB) driver for it",
        location, CLAIM_ATTEMPTS
    );
    Err(DriverError::InterfaceBusy {
        attempts: CLAIM_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::UsbBackend;
    use crate::usb::mock::{MockDevice, MockUsb};
    use ambx_protocol::{AMBX_PID, AMBX_VID};

    fn single_device_bus() -> (MockUsb, usize) {
        let mock = MockUsb::new();
        let index = mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4));
        (mock, index)
    }

    fn open_session(mock: &MockUsb, index: usize) -> AmbxSession<MockUsb> {
        let device = mock.devices().unwrap()[index];
        AmbxSession::open(mock, &device, format!("USB amBX: Bus 1 Addr {}", index + 4)).unwrap()
    }

    #[test]
    fn test_construction_claims_then_resets() {
        let (mock, index) = single_device_bus();
        let session = open_session(&mock, index);

        assert!(session.is_initialized());
        assert!(mock.is_claimed(index));

        // The first protocol action is a reset-to-black of every zone.
        let writes = mock.writes(index);
        assert_eq!(writes.len(), Zone::ADDRESSABLE.len());
        for ((endpoint, data), zone) in writes.iter().zip(Zone::ADDRESSABLE) {
            assert_eq!(*endpoint, ENDPOINT_OUT);
            assert_eq!(*data, packet::set_color(zone, Color::BLACK));
        }
    }

    #[test]
    fn test_short_writes_are_retried_then_dropped() {
        let mock = MockUsb::new();
        let index =
            mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4).with_short_write(3));

        let mut session = open_session(&mock, index);
        mock.clear_writes(index);

        // Best-effort contract: the caller never sees the failure.
        session.set_zone_color(Zone::Left, Color::new(9, 9, 9)).unwrap();
        assert_eq!(mock.writes(index).len() as u32, SEND_ATTEMPTS);
    }

    #[test]
    fn test_transfer_errors_are_retried_then_dropped() {
        let mock = MockUsb::new();
        let index = mock
            .add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4).with_write_error(UsbError::Io));

        let mut session = open_session(&mock, index);
        mock.clear_writes(index);

        session.set_zone_color(Zone::Right, Color::new(1, 2, 3)).unwrap();
        assert_eq!(mock.writes(index).len() as u32, SEND_ATTEMPTS);
    }

    #[test]
    fn test_busy_interface_exhausts_claim_attempts() {
        let mock = MockUsb::new();
        let index = mock
            .add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4).with_busy_claims(u32::MAX));

        let device = mock.devices().unwrap()[index];
        let err = AmbxSession::open(&mock, &device, "USB amBX: Bus 1 Addr 4".to_string())
            .unwrap_err();

        assert!(matches!(
            err,
            DriverError::InterfaceBusy {
                attempts: CLAIM_ATTEMPTS
            }
        ));
        assert_eq!(mock.claim_attempts(index), CLAIM_ATTEMPTS);
        assert!(mock.writes(index).is_empty());
    }

    #[test]
    fn test_contended_claim_recovers_within_retry_limit() {
        let mock = MockUsb::new();
        let index =
            mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4).with_busy_claims(2));

        let session = open_session(&mock, index);
        assert!(session.is_initialized());
        assert_eq!(mock.claim_attempts(index), 3);
    }

    #[test]
    fn test_serial_is_read_best_effort() {
        let mock = MockUsb::new();
        let with_serial =
            mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4).with_serial("AMBX0001"));
        let without_serial = mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 5));

        let session = open_session(&mock, with_serial);
        assert_eq!(session.serial(), "AMBX0001");

        let session = open_session(&mock, without_serial);
        assert_eq!(session.serial(), "");
    }
}
