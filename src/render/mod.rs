//! # Rendering Module
//!
//! Turns the graphical parts of a receipt into printable rasters.
//!
//! ## Modules
//!
//! - [`dither`]: Bayer 8x8 ordered dithering for binary conversion
//! - [`logo`]: Logo file decoding and scaling
//! - [`qr`]: QR code encoding
//!
//! ```
//! use thermal_bridge::render::qr;
//!
//! let raster = qr::render("https://x.test/a", qr::DEFAULT_MODULE_SIZE, 384)?;
//! assert_eq!(raster.width, raster.height);
//! # Ok::<(), thermal_bridge::render::RenderError>(())
//! ```

pub mod dither;
pub mod logo;
pub mod qr;

use std::path::PathBuf;

use thiserror::Error;

/// Maximum image width for 58mm printers; safe on 80mm paper too.
pub const MAX_WIDTH_DOTS: u32 = 384;

/// Failure to render one section of a receipt.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("logo not found: {}", .0.display())]
    MissingLogo(PathBuf),

    #[error("logo decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("QR encode failed: {0}")]
    Qr(qrcode::types::QrError),
}

impl From<qrcode::types::QrError> for RenderError {
    fn from(e: qrcode::types::QrError) -> Self {
        RenderError::Qr(e)
    }
}
