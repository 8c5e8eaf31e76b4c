//! RGB-zone capability exposed to the host.
//!
//! The host application sees lighting devices through the
//! [`ZoneLighting`] trait: a name, a location, a flat list of zones,
//! and per-zone or all-zones color requests. [`AmbxLights`] adapts an
//! [`AmbxSession`] to that shape.

use ambx_protocol::{Color, Zone};

use crate::error::{DriverError, Result};
use crate::session::AmbxSession;
use crate::usb::UsbBackend;

/// Host-facing view of one zoned lighting device.
pub trait ZoneLighting {
    /// Display name for device lists.
    fn name(&self) -> &str;

    /// Physical location string.
    fn location(&self) -> &str;

    /// Serial number, empty when unavailable.
    fn serial(&self) -> &str;

    /// Labels of the addressable zones, in index order.
    fn zones(&self) -> Vec<&'static str>;

    /// Set one zone by flat index.
    fn set_zone(&mut self, index: usize, color: Color) -> Result<()>;

    /// Set every zone to the same color.
    fn set_all(&mut self, color: Color) -> Result<()>;
}

/// Adapter presenting an [`AmbxSession`] as a zoned lighting device.
pub struct AmbxLights<B: UsbBackend> {
    session: AmbxSession<B>,
    name: String,
}

impl<B: UsbBackend> AmbxLights<B> {
    /// Wrap a session. `index` is the unit's position in the host's
    /// device list; the first unit keeps the bare product name and
    /// later units are numbered.
    pub fn new(session: AmbxSession<B>, index: usize) -> Self {
        let name = if index == 0 {
            "Philips amBX".to_string()
        } else {
            format!("Philips amBX {}", index + 1)
        };

        Self { session, name }
    }

    /// Direct access to the wrapped session.
    pub fn session_mut(&mut self) -> &mut AmbxSession<B> {
        &mut self.session
    }
}

impl<B: UsbBackend> ZoneLighting for AmbxLights<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &str {
        self.session.location()
    }

    fn serial(&self) -> &str {
        self.session.serial()
    }

    fn zones(&self) -> Vec<&'static str> {
        Zone::ADDRESSABLE.iter().map(|zone| zone.label()).collect()
    }

    fn set_zone(&mut self, index: usize, color: Color) -> Result<()> {
        let zone = *Zone::ADDRESSABLE
            .get(index)
            .ok_or(DriverError::InvalidZone {
                index,
                count: Zone::ADDRESSABLE.len(),
            })?;

        self.session.set_zone_color(zone, color)
    }

    fn set_all(&mut self, color: Color) -> Result<()> {
        self.session.set_all_zones(color)
    }
}
