//! Scripted USB backend for tests.
//!
//! [`MockUsb`] replays a configured device list and records every
//! operation a session performs against it: claim attempts, releases,
//! and interrupt writes. Failure injection covers the cases the driver
//! has to survive — unopenable devices, contended interfaces, transfer
//! errors, and short writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ambx_protocol::packet;

use super::backend::{DeviceDescription, UsbBackend, UsbError, UsbHandle};

/// One scripted device on the mock bus.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub description: DeviceDescription,
    pub serial: Option<String>,
    /// Error returned from `open`, if any.
    pub open_error: Option<UsbError>,
    /// Number of leading claim attempts that fail with `Busy`. Use
    /// `u32::MAX` for a permanently contended interface.
    pub busy_claims: u32,
    /// Error returned from every interrupt write, if any.
    pub write_error: Option<UsbError>,
    /// Report this many bytes written instead of the full buffer.
    pub short_write: Option<usize>,
}

impl MockDevice {
    /// A well-behaved device with the given identity and location.
    pub fn new(vendor_id: u16, product_id: u16, bus_number: u8, device_address: u8) -> Self {
        Self {
            description: DeviceDescription {
                vendor_id,
                product_id,
                bus_number,
                device_address,
            },
            serial: None,
            open_error: None,
            busy_claims: 0,
            write_error: None,
            short_write: None,
        }
    }

    pub fn with_serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub fn with_open_error(mut self, error: UsbError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn with_busy_claims(mut self, attempts: u32) -> Self {
        self.busy_claims = attempts;
        self
    }

    pub fn with_write_error(mut self, error: UsbError) -> Self {
        self.write_error = Some(error);
        self
    }

    pub fn with_short_write(mut self, written: usize) -> Self {
        self.short_write = Some(written);
        self
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    claim_attempts: u32,
    claimed: bool,
    releases: u32,
    writes: Vec<(u8, Vec<u8>)>,
}

#[derive(Debug, Default)]
struct MockBus {
    devices: Vec<MockDevice>,
    states: Vec<DeviceState>,
    devices_error: Option<UsbError>,
}

/// In-memory USB backend recording every operation.
///
/// Cloning is cheap and shares the underlying bus, so tests can keep a
/// handle for assertions while the driver owns another.
#[derive(Clone, Default)]
pub struct MockUsb {
    bus: Arc<Mutex<MockBus>>,
}

impl MockUsb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device to the bus; returns its index.
    pub fn add_device(&self, device: MockDevice) -> usize {
        let mut bus = self.bus.lock().expect("lock poisoned");
        bus.devices.push(device);
        bus.states.push(DeviceState::default());
        bus.devices.len() - 1
    }

    /// Make device-list retrieval fail.
    pub fn fail_enumeration(&self, error: UsbError) {
        self.bus.lock().expect("lock poisoned").devices_error = Some(error);
    }

    /// Claim attempts made against a device so far.
    pub fn claim_attempts(&self, index: usize) -> u32 {
        self.bus.lock().expect("lock poisoned").states[index].claim_attempts
    }

    /// Whether the device's interface is currently claimed.
    pub fn is_claimed(&self, index: usize) -> bool {
        self.bus.lock().expect("lock poisoned").states[index].claimed
    }

    /// How often the interface has been released.
    pub fn releases(&self, index: usize) -> u32 {
        self.bus.lock().expect("lock poisoned").states[index].releases
    }

    /// Every interrupt write attempted against a device, as
    /// `(endpoint, bytes)` in order, including failed attempts.
    pub fn writes(&self, index: usize) -> Vec<(u8, Vec<u8>)> {
        self.bus.lock().expect("lock poisoned").states[index]
            .writes
            .clone()
    }

    /// Forget recorded writes, e.g. the construction-time reset.
    pub fn clear_writes(&self, index: usize) {
        self.bus.lock().expect("lock poisoned").states[index]
            .writes
            .clear();
    }

    /// Last color written per zone id, decoded from set-color frames.
    pub fn last_colors(&self, index: usize) -> HashMap<u8, (u8, u8, u8)> {
        let bus = self.bus.lock().expect("lock poisoned");
        let mut colors = HashMap::new();

        for (_, data) in &bus.states[index].writes {
            if data.len() == packet::SET_COLOR_LEN
                && data[0] == packet::PACKET_HEADER
                && data[2] == packet::CMD_SET_COLOR
            {
                colors.insert(data[1], (data[3], data[4], data[5]));
            }
        }

        colors
    }
}

impl UsbBackend for MockUsb {
    type Device = usize;
    type Handle = MockHandle;

    fn devices(&self) -> Result<Vec<usize>, UsbError> {
        let bus = self.bus.lock().expect("lock poisoned");
        if let Some(error) = &bus.devices_error {
            return Err(error.clone());
        }
        Ok((0..bus.devices.len()).collect())
    }

    fn describe(&self, device: &usize) -> Result<DeviceDescription, UsbError> {
        let bus = self.bus.lock().expect("lock poisoned");
        Ok(bus.devices[*device].description)
    }

    fn open(&self, device: &usize) -> Result<MockHandle, UsbError> {
        let bus = self.bus.lock().expect("lock poisoned");
        if let Some(error) = &bus.devices[*device].open_error {
            return Err(error.clone());
        }

        Ok(MockHandle {
            bus: Arc::clone(&self.bus),
            index: *device,
        })
    }
}

/// Handle into the mock bus.
pub struct MockHandle {
    bus: Arc<Mutex<MockBus>>,
    index: usize,
}

impl UsbHandle for MockHandle {
    fn set_auto_detach_kernel_driver(&mut self, _enabled: bool) -> Result<(), UsbError> {
        Ok(())
    }

    fn claim_interface(&mut self, _interface: u8) -> Result<(), UsbError> {
        let mut bus = self.bus.lock().expect("lock poisoned");
        let busy_claims = bus.devices[self.index].busy_claims;

        let state = &mut bus.states[self.index];
        state.claim_attempts += 1;
        if state.claim_attempts <= busy_claims {
            return Err(UsbError::Busy);
        }

        state.claimed = true;
        Ok(())
    }

    fn release_interface(&mut self, _interface: u8) -> Result<(), UsbError> {
        let mut bus = self.bus.lock().expect("lock poisoned");
        let state = &mut bus.states[self.index];
        state.claimed = false;
        state.releases += 1;
        Ok(())
    }

    fn read_serial_string(&mut self) -> Result<Option<String>, UsbError> {
        let bus = self.bus.lock().expect("lock poisoned");
        Ok(bus.devices[self.index].serial.clone())
    }

    fn write_interrupt(
        &mut self,
        endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, UsbError> {
        let mut bus = self.bus.lock().expect("lock poisoned");
        let write_error = bus.devices[self.index].write_error.clone();
        let short_write = bus.devices[self.index].short_write;

        // Failed attempts are recorded too, so tests can count retries.
        bus.states[self.index].writes.push((endpoint, data.to_vec()));

        if let Some(error) = write_error {
            return Err(error);
        }

        Ok(short_write.unwrap_or(data.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_writes_in_order() {
        let mock = MockUsb::new();
        let index = mock.add_device(MockDevice::new(0x0471, 0x083F, 1, 4));

        let mut handle = mock.open(&index).unwrap();
        handle
            .write_interrupt(0x02, &[1, 2, 3], Duration::from_millis(100))
            .unwrap();
        handle
            .write_interrupt(0x02, &[4, 5, 6], Duration::from_millis(100))
            .unwrap();

        let writes = mock.writes(index);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], (0x02, vec![1, 2, 3]));
        assert_eq!(writes[1], (0x02, vec![4, 5, 6]));
    }

    #[test]
    fn test_busy_claims_clear_after_configured_attempts() {
        let mock = MockUsb::new();
        let index = mock.add_device(MockDevice::new(0x0471, 0x083F, 1, 4).with_busy_claims(2));

        let mut handle = mock.open(&index).unwrap();
        assert_eq!(handle.claim_interface(0), Err(UsbError::Busy));
        assert_eq!(handle.claim_interface(0), Err(UsbError::Busy));
        assert_eq!(handle.claim_interface(0), Ok(()));
        assert!(mock.is_claimed(index));
        assert_eq!(mock.claim_attempts(index), 3);
    }

    #[test]
    fn test_enumeration_failure_is_scriptable() {
        let mock = MockUsb::new();
        mock.fail_enumeration(UsbError::Io);
        assert_eq!(mock.devices(), Err(UsbError::Io));
    }
}
