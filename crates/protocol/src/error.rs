//! Protocol error types

use thiserror::Error;

/// Errors from validating protocol-level input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A zone byte outside the recognized set.
    #[error("unrecognized zone id {0:#04x}")]
    InvalidZone(u8),

    /// A color string that is not six hex digits.
    #[error("invalid color {0:?} (expected RRGGBB hex)")]
    InvalidColor(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_zone_display() {
        let msg = format!("{}", ProtocolError::InvalidZone(0x5C));
        assert!(msg.contains("0x5c"));
    }

    #[test]
    fn test_invalid_color_display() {
        let msg = format!("{}", ProtocolError::InvalidColor("nope".to_string()));
        assert!(msg.contains("nope"));
        assert!(msg.contains("RRGGBB"));
    }
}
