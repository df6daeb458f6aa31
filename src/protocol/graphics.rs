//! # ESC/POS Raster Graphics
//!
//! Prints 1-bit images with `GS v 0`, the raster bit-image command that
//! every ESC/POS printer in the supported vendor list understands.
//!
//! ## Data Layout
//!
//! Each row is `ceil(width / 8)` bytes, MSB first, 1 = black dot:
//!
//! ```text
//! Row 0: [byte 0][byte 1]...[byte w-1]
//! Row 1: [byte 0][byte 1]...[byte w-1]
//! ...
//! ```

use super::commands::{GS, u16_le};

/// # Print Raster Bit Image (GS v 0 m xL xH yL yH d1...dk)
///
/// ## Parameters
///
/// - `width_dots`: Image width in dots (rounded up to a whole byte)
/// - `height`: Number of rows
/// - `data`: Packed row data, `ceil(width_dots/8) * height` bytes
///
/// ```
/// use thermal_bridge::protocol::graphics;
///
/// let cmd = graphics::raster(16, 2, &[0xFF, 0x00, 0x00, 0xFF]);
/// assert_eq!(&cmd[0..8], &[0x1D, 0x76, 0x30, 0x00, 2, 0, 2, 0]);
/// assert_eq!(cmd.len(), 8 + 4);
/// ```
pub fn raster(width_dots: u16, height: u16, data: &[u8]) -> Vec<u8> {
    let width_bytes = width_dots.div_ceil(8);

    debug_assert!(
        data.len() == width_bytes as usize * height as usize,
        "Raster data length mismatch. Expected {} ({} bytes × {} rows), got {}",
        width_bytes as usize * height as usize,
        width_bytes,
        height,
        data.len()
    );

    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);

    let mut cmd = Vec::with_capacity(8 + data.len());
    cmd.extend_from_slice(&[GS, b'v', b'0', 0]); // m = 0 (normal density)
    cmd.extend_from_slice(&[xl, xh, yl, yh]);
    cmd.extend_from_slice(data);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_header_wide_image() {
        let width = 384u16;
        let data = vec![0u8; 48 * 3];
        let cmd = raster(width, 3, &data);
        assert_eq!(&cmd[0..4], &[0x1D, 0x76, 0x30, 0x00]);
        assert_eq!(cmd[4], 48);
        assert_eq!(cmd[5], 0);
        assert_eq!(cmd[6], 3);
        assert_eq!(cmd[7], 0);
        assert_eq!(cmd.len(), 8 + 48 * 3);
    }

    #[test]
    fn test_raster_rounds_width_up() {
        let cmd = raster(9, 1, &[0xFF, 0x80]);
        assert_eq!(cmd[4], 2);
    }
}
