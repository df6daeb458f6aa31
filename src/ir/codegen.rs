//! # Code Generation
//!
//! Converts an [`EscposDocument`] to ESC/POS bytes.

use super::ops::{EscposDocument, Op, Raster};
use crate::protocol::{commands, cp437, graphics, text};

impl EscposDocument {
    /// Compile the document, consuming it.
    pub fn into_bytes(self) -> Vec<u8> {
        self.to_bytes()
    }

    /// Compile the document to ESC/POS bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        for op in self.iter() {
            match op {
                Op::SetAlign(align) => out.extend(text::align(*align)),
                Op::SetSize { width, height } => out.extend(text::size(*width, *height)),
                Op::Text(s) => out.extend(cp437::encode(s)),
                Op::Newline => out.extend(commands::line_feed()),
                Op::ResetSize => out.extend(text::size_normal()),
                Op::Image(raster) | Op::QrCode { raster, .. } => emit_raster(&mut out, raster),
            }
        }

        out
    }
}

fn emit_raster(out: &mut Vec<u8>, raster: &Raster) {
    if raster.height == 0 || raster.width == 0 {
        return;
    }
    out.extend(graphics::raster(raster.width, raster.height, &raster.data));
    // GS v 0 leaves the head at the image bottom; LF starts the next line cleanly
    out.push(commands::LF);
}
