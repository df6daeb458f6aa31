//! # Bayer 8x8 Ordered Dithering
//!
//! Converts grayscale intensity to the 1-bit dots a thermal head can print.
//! For each pixel (x, y) the intensity is compared with a threshold taken from
//! the Bayer matrix at (x mod 8, y mod 8); above the threshold prints black.
//!
//! Ordered dithering is deterministic, so the same logo always produces the
//! same bytes on the wire.
//!
//! ```
//! use thermal_bridge::render::dither;
//!
//! let row = vec![true, true, false, false, true, false, true, false];
//! assert_eq!(dither::pack_row(&row), vec![0b11001010]);
//! ```

/// Bayer 8x8 dithering matrix (values 0-63).
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Threshold in (0, 1) for a pixel position; never exactly 0 or 1, so pure
/// white never prints and pure black always does.
#[inline]
pub fn threshold(x: usize, y: usize) -> f32 {
    (BAYER8[y & 7][x & 7] as f32 + 0.5) / 64.0
}

/// Whether to print a dot. `intensity` is 0.0 (white) to 1.0 (black).
#[inline]
pub fn should_print(x: usize, y: usize, intensity: f32) -> bool {
    intensity > threshold(x, y)
}

/// Pack a row of dots into bytes, MSB first, zero padded.
///
/// ```
/// use thermal_bridge::render::dither::pack_row;
///
/// assert_eq!(pack_row(&vec![true; 12]), vec![0xFF, 0xF0]);
/// ```
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; pixels.len().div_ceil(8)];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            bytes[i / 8] |= 1 << (7 - (i % 8));
        }
    }

    bytes
}

/// Dither an intensity field into packed raster rows.
///
/// Length of the result is `ceil(width/8) * height`.
pub fn rasterize<F>(width: usize, height: usize, intensity: F) -> Vec<u8>
where
    F: Fn(usize, usize) -> f32,
{
    let mut data = Vec::with_capacity(width.div_ceil(8) * height);
    let mut row = Vec::with_capacity(width);

    for y in 0..height {
        row.clear();
        row.extend((0..width).map(|x| should_print(x, y, intensity(x, y))));
        data.extend(pack_row(&row));
    }

    data
}
