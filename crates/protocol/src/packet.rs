//! Command packet framing.
//!
//! Every color command is a fixed six-byte frame sent as one interrupt
//! transfer: `[0xA1, zone, 0x03, red, green, blue]`. The device never
//! acknowledges a frame, so framing carries no sequence numbers or
//! checksums.

use crate::types::{Color, Zone};

/// Leading byte of every single-zone command frame.
pub const PACKET_HEADER: u8 = 0xA1;
/// Set-color command code.
pub const CMD_SET_COLOR: u8 = 0x03;
/// Length of a set-color frame in bytes.
pub const SET_COLOR_LEN: usize = 6;

/// Build the set-color frame for one zone.
///
/// The frame is built fresh per call and never reused.
pub fn set_color(zone: Zone, color: Color) -> [u8; SET_COLOR_LEN] {
    [
        PACKET_HEADER,
        zone.id(),
        CMD_SET_COLOR,
        color.r,
        color.g,
        color.b,
    ]
}
