//! Logo loading: decode, fit to the print width, dither to 1-bit.

use std::path::Path;

use image::{DynamicImage, GenericImageView, imageops::FilterType};
use tracing::debug;

use super::{RenderError, dither};
use crate::ir::Raster;

/// Load a logo file and convert it to a printable raster no wider than
/// `max_width` dots. Transparent pixels print white.
pub fn load(path: &Path, max_width: u32) -> Result<Raster, RenderError> {
    if !path.exists() {
        return Err(RenderError::MissingLogo(path.to_path_buf()));
    }
    let img = image::open(path)?;
    debug!(path = %path.display(), dimensions = ?img.dimensions(), "logo opened");
    Ok(from_image(&img, max_width))
}

/// Convert a decoded image to a raster.
pub fn from_image(img: &DynamicImage, max_width: u32) -> Raster {
    let (w, h) = img.dimensions();
    let resized = if w > max_width {
        let new_h = ((h as f64) * (max_width as f64) / (w as f64)).round().max(1.0) as u32;
        img.resize_exact(max_width, new_h, FilterType::Triangle)
    } else {
        img.clone()
    };

    let rgba = resized.to_rgba8();
    let (width, height) = rgba.dimensions();
    let height = height.min(u16::MAX as u32);

    let data = dither::rasterize(width as usize, height as usize, |x, y| {
        let px = rgba.get_pixel(x as u32, y as u32);
        if px[3] < 128 {
            return 0.0;
        }
        let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        1.0 - luma / 255.0
    });

    Raster {
        width: width as u16,
        height: height as u16,
        data,
    }
}
