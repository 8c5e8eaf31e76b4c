//! Wire protocol for the Philips amBX Gaming lights.
//!
//! The amBX peripheral is driven over USB interrupt transfers carrying
//! small fixed-format command frames. This crate defines the device
//! identity, the addressable lighting zones, colors, and the packet
//! framing. It has no USB dependency and is shared between the driver
//! and its test suites.
//!
//! # Example
//!
//! ```
//! use ambx_protocol::{packet, Color, Zone};
//!
//! let frame = packet::set_color(Zone::Left, Color::new(255, 0, 0));
//! assert_eq!(frame, [0xA1, 0x0B, 0x03, 0xFF, 0x00, 0x00]);
//! ```

pub mod error;
pub mod packet;
pub mod types;

pub use error::ProtocolError;
pub use types::{AMBX_PID, AMBX_VID, Color, ENDPOINT_IN, ENDPOINT_OUT, ENDPOINT_PNP, Zone};
