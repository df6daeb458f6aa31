//! # ESC/POS Control Commands
//!
//! Basic control sequences shared by the generic ESC/POS thermal printers this
//! bridge drives (58mm/80mm POS printers from Xprinter, Epson, Rongta, etc.).
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`
//! - Two bytes: `ESC @`
//! - Multi-byte with parameters: `ESC a n`, `GS ! n`, `GS v 0 m xL xH yL yH d...`
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for character size (`GS !`) and raster graphics (`GS v 0`).
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print the line buffer and advance one line
pub const LF: u8 = 0x0A;

/// # Initialize Printer (ESC @)
///
/// Clears the print buffer and resets text modes to power-on defaults.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ```
/// use thermal_bridge::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

/// Print and feed one line.
#[inline]
pub fn line_feed() -> Vec<u8> {
    vec![LF]
}

/// Split a u16 into little-endian bytes.
#[inline]
pub(crate) fn u16_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}
