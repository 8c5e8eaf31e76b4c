//! Discovery tests: identity matching, scan resilience, and the
//! fail-open behavior of a pass that cannot enumerate the bus.

use ambx_driver::discover;
use ambx_driver::usb::UsbError;
use ambx_driver::usb::mock::{MockDevice, MockUsb};
use ambx_protocol::{AMBX_PID, AMBX_VID};

#[test]
fn test_non_matching_devices_are_never_touched() {
    let mock = MockUsb::new();
    let keyboard = mock.add_device(MockDevice::new(0x046D, 0xC52B, 1, 2));
    let wrong_pid = mock.add_device(MockDevice::new(AMBX_VID, 0x0001, 1, 3));

    let sessions = discover(&mock);
    assert!(sessions.is_empty());

    for index in [keyboard, wrong_pid] {
        assert_eq!(mock.claim_attempts(index), 0);
        assert!(mock.writes(index).is_empty());
    }
}

#[test]
fn test_one_unopenable_unit_does_not_stop_the_scan() {
    let mock = MockUsb::new();
    let broken =
        mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4).with_open_error(UsbError::Access));
    let healthy = mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 2, 9));

    let sessions = discover(&mock);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].location(), "USB amBX: Bus 2 Addr 9");

    assert!(mock.writes(broken).is_empty());
    assert!(mock.is_claimed(healthy));
}

#[test]
fn test_enumeration_failure_aborts_only_this_pass() {
    let mock = MockUsb::new();
    mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4));
    mock.fail_enumeration(UsbError::Io);

    // The pass fails closed with an empty result instead of
    // propagating the error to the host.
    let sessions = discover(&mock);
    assert!(sessions.is_empty());
}

#[test]
fn test_location_strings_identify_each_unit() {
    let mock = MockUsb::new();
    mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 3, 11));

    let sessions = discover(&mock);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].location(), "USB amBX: Bus 3 Addr 11");
}

#[test]
fn test_all_units_busy_still_completes_the_scan() {
    let mock = MockUsb::new();
    let first =
        mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 4).with_busy_claims(u32::MAX));
    let second =
        mock.add_device(MockDevice::new(AMBX_VID, AMBX_PID, 1, 5).with_busy_claims(u32::MAX));

    let sessions = discover(&mock);
    assert!(sessions.is_empty());

    // Both units were tried; neither aborted the pass for the other.
    assert_eq!(mock.claim_attempts(first), 3);
    assert_eq!(mock.claim_attempts(second), 3);
}
