//! Device discovery.
//!
//! Scans the USB bus for amBX units and produces one initialized
//! session per accessible unit. One inaccessible unit never stops the
//! scan, and a scan pass always runs to completion.

use ambx_protocol::{AMBX_PID, AMBX_VID};
use tracing::{error, info, warn};

use crate::session::AmbxSession;
use crate::usb::UsbBackend;

/// Find every attached amBX unit and open a session for each.
///
/// Units that match the device identity but fail to open or claim are
/// logged and skipped. Device-list retrieval failure aborts only this
/// pass and yields an empty list; the host process is unaffected.
pub fn discover<B: UsbBackend>(backend: &B) -> Vec<AmbxSession<B>> {
    info!("Scanning for amBX devices");

    let devices = match backend.devices() {
        Ok(devices) => devices,
        Err(e) => {
            error!("Failed to get USB device list: {}", e);
            return Vec::new();
        }
    };

    let mut sessions = Vec::new();
    let mut matched = 0usize;

    for device in &devices {
        let description = match backend.describe(device) {
            Ok(description) => description,
            Err(_) => continue,
        };

        if description.vendor_id != AMBX_VID || description.product_id != AMBX_PID {
            continue;
        }

        matched += 1;
        let location = format!(
            "USB amBX: Bus {} Addr {}",
            description.bus_number, description.device_address
        );
        info!("Found amBX device at {}", location);

        match AmbxSession::open(backend, device, location.clone()) {
            Ok(session) => sessions.push(session),
            Err(e) => {
                warn!("Could not initialize amBX device at {}: {}", location, e);
            }
        }
    }

    if matched > 0 && sessions.is_empty() {
        warn!(
            "{} amBX device(s) present but none could be initialized; another driver may hold the device - install a generic USB (WinUSB) driver for it",
            matched
        );
    }

    info!("amBX scan complete: {} device(s) initialized", sessions.len());
    sessions
}
