//! RGBW Light Protocol
//!
//! This module contains the protocol definitions for communicating with
//! the light: identifiers, the default pattern palette and the command
//! frame encoder.

use crate::domain::models::{ColorCommand, ServiceIdentifier};
use uuid::Uuid;

/// Light BLE Service UUID, also used as the control characteristic UUID
pub const SERVICE_UUID: &str = "00000000-0000-1000-8000-00805F9B34FB";

/// Parsed form of [`SERVICE_UUID`]
pub const SERVICE_ID: ServiceIdentifier =
    ServiceIdentifier::new(Uuid::from_u128(0x00000000_0000_1000_8000_00805f9b34fb));

/// Advertised name of the light
pub const DEVICE_NAME: &str = "KBX5";

/// Default pattern animation interval in milliseconds
pub const PATTERN_INTERVAL_MS: u64 = 800;

/// Size of every command frame in bytes
pub const FRAME_LEN: usize = 10;

/// Default pattern palette (red, green, blue, white)
pub const DEFAULT_PALETTE: [ColorCommand; 10] = [
    ColorCommand::new(0xFF, 0x8D, 0x8B, 0x00),
    ColorCommand::new(0xFE, 0xD6, 0x89, 0x00),
    ColorCommand::new(0x88, 0xFF, 0x89, 0x00),
    ColorCommand::new(0x87, 0xFF, 0xFF, 0x00),
    ColorCommand::new(0x8B, 0xB5, 0xFE, 0x00),
    ColorCommand::new(0xD7, 0x8C, 0xFF, 0x00),
    ColorCommand::new(0xFF, 0x8C, 0xFF, 0x00),
    ColorCommand::new(0xFF, 0x68, 0xF7, 0x00),
    ColorCommand::new(0xFE, 0x6C, 0xB7, 0x00),
    ColorCommand::new(0xFF, 0x69, 0x68, 0x00),
];

/// A single write to the control characteristic
///
/// # Frame Structure (10 bytes)
///
/// ```text
/// [0]     : Reserved, always 0x00
/// [1]     : Red
/// [2]     : Green
/// [3]     : Blue
/// [4]     : White
/// [5-9]   : Padding, always 0x00
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<ColorCommand> for CommandFrame {
    fn from(color: ColorCommand) -> Self {
        encode(color)
    }
}

/// Encode a color into its command frame
pub fn encode(color: ColorCommand) -> CommandFrame {
    let mut frame = [0u8; FRAME_LEN];
    frame[1] = color.red;
    frame[2] = color.green;
    frame[3] = color.blue;
    frame[4] = color.white;
    CommandFrame(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_matches_string() {
        assert_eq!(SERVICE_ID, SERVICE_UUID.parse().unwrap());
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode(ColorCommand::new(10, 20, 30, 40));
        assert_eq!(frame.as_bytes(), &[0, 10, 20, 30, 40, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_keeps_reserved_bytes_zero() {
        for value in [0u8, 1, 0x7F, 0x80, 0xFE, 0xFF] {
            let color = ColorCommand::new(value, value.wrapping_add(1), value ^ 0xFF, value);
            let bytes = encode(color);
            let bytes = bytes.as_bytes();
            assert_eq!(bytes.len(), FRAME_LEN);
            assert_eq!(bytes[0], 0);
            assert_eq!(&bytes[5..], &[0, 0, 0, 0, 0]);
            assert_eq!(
                &bytes[1..5],
                &[color.red, color.green, color.blue, color.white]
            );
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let color = ColorCommand::new(0xFF, 0x00, 0xFF, 0x00);
        assert_eq!(encode(color), encode(color));
        assert_eq!(CommandFrame::from(color), encode(color));
    }
}
