//! QR code encoding to a printable raster.
//!
//! The QR is encoded on the host (error correction L) and printed as an image,
//! so it renders the same on printers without native QR support.

use qrcode::{Color, EcLevel, QrCode};

use super::{RenderError, dither::pack_row};
use crate::ir::Raster;

/// Dots per QR module when the code fits the paper.
pub const DEFAULT_MODULE_SIZE: u8 = 8;

/// White border around the symbol, in modules.
pub const QUIET_ZONE: usize = 1;

/// Encode `data` and scale it to `module_size` dots per module, shrinking the
/// module size as needed to stay within `max_width` dots.
pub fn render(data: &str, module_size: u8, max_width: u32) -> Result<Raster, RenderError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)?;
    let modules = code.width();
    let total = modules + 2 * QUIET_ZONE;

    let cell = (module_size.max(1) as usize)
        .min(max_width as usize / total)
        .max(1);
    let size = total * cell;

    let mut out = Vec::with_capacity(size.div_ceil(8) * size);
    let mut row = vec![false; size];
    for y in 0..size {
        let my = y / cell;
        for (x, dot) in row.iter_mut().enumerate() {
            let mx = x / cell;
            *dot = inside(mx, modules) && inside(my, modules) && {
                code[(mx - QUIET_ZONE, my - QUIET_ZONE)] == Color::Dark
            };
        }
        out.extend(pack_row(&row));
    }

    Ok(Raster {
        width: size as u16,
        height: size as u16,
        data: out,
    })
}

fn inside(m: usize, modules: usize) -> bool {
    m >= QUIET_ZONE && m < QUIET_ZONE + modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_url_uses_full_module_size() {
        // 16 bytes at level L fits version 1 (21 modules)
        let raster = render("https://x.test/a", DEFAULT_MODULE_SIZE, 384).unwrap();
        assert_eq!(raster.width as usize, (21 + 2) * 8);
        assert_eq!(raster.width, raster.height);
        assert_eq!(raster.data.len(), raster.width_bytes() * raster.height as usize);
    }

    #[test]
    fn test_quiet_zone_is_white() {
        let raster = render("hello", 4, 384).unwrap();
        let wb = raster.width_bytes();
        assert!(raster.data[..wb * 4].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_finder_pattern_is_dark() {
        let raster = render("hello", 1, 384).unwrap();
        // first dark row sits just below the one-module quiet zone
        let wb = raster.width_bytes();
        let row1 = &raster.data[wb..wb * 2];
        assert_eq!(row1[0] & 0b0111_1111, 0b0111_1111);
    }

    #[test]
    fn test_module_size_shrinks_to_fit() {
        let long = "https://example.com/".to_string() + &"a".repeat(200);
        let raster = render(&long, DEFAULT_MODULE_SIZE, 384).unwrap();
        assert!(raster.width <= 384);
    }

    #[test]
    fn test_payload_over_capacity_fails() {
        let huge = "x".repeat(5000);
        assert!(matches!(
            render(&huge, DEFAULT_MODULE_SIZE, 384),
            Err(RenderError::Qr(_))
        ));
    }
}
