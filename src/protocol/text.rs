//! # ESC/POS Text Commands
//!
//! Alignment and character size selection.
//!
//! ## Text Alignment
//!
//! ```text
//! Left aligned (default)    |LEFT TEXT
//! Center aligned            |  CENTER TEXT
//! Right aligned             |      RIGHT TEXT
//! ```
//!
//! Alignment also applies to raster images printed with `GS v 0`, which is how
//! the logo and QR code end up centered on the receipt.

use super::commands::{ESC, GS};

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

/// # Set Justification (ESC a n)
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC a n |
/// | Hex     | 1B 61 n |
///
/// ```
/// use thermal_bridge::protocol::text::{align, Alignment};
///
/// assert_eq!(align(Alignment::Center), vec![0x1B, 0x61, 0x01]);
/// ```
pub fn align(alignment: Alignment) -> Vec<u8> {
    vec![ESC, b'a', alignment as u8]
}

/// # Select Character Size (GS ! n)
///
/// `width` and `height` are multipliers (1 = normal, 2 = double, up to 8).
/// The upper nibble of `n` carries the width, the lower nibble the height.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | GS ! n |
/// | Hex     | 1D 21 n |
///
/// ```
/// use thermal_bridge::protocol::text::size;
///
/// assert_eq!(size(2, 2), vec![0x1D, 0x21, 0x11]);
/// assert_eq!(size(1, 2), vec![0x1D, 0x21, 0x01]);
/// assert_eq!(size(1, 1), vec![0x1D, 0x21, 0x00]);
/// ```
pub fn size(width: u8, height: u8) -> Vec<u8> {
    let w = width.clamp(1, 8) - 1;
    let h = height.clamp(1, 8) - 1;
    vec![GS, b'!', (w << 4) | h]
}

/// Reset to normal size (1x1)
#[inline]
pub fn size_normal() -> Vec<u8> {
    size(1, 1)
}
