//! # IR Opcodes
//!
//! A print job is an ordered sequence of opcodes that is built once, inspected
//! if needed, and compiled to ESC/POS bytes exactly once when handed to a
//! transport.
//!
//! ```text
//! ProtocolBuilder → EscposDocument (Vec<Op>) → Codegen → Bytes → Transport
//! ```

use crate::protocol::text::Alignment;

/// A packed 1-bit image ready for `GS v 0`.
///
/// Rows are `ceil(width / 8)` bytes, MSB first, 1 = black.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
}

impl Raster {
    /// Bytes per row.
    pub fn width_bytes(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Raster({}x{}, {} bytes)", self.width, self.height, self.data.len())
    }
}

/// IR opcodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Set alignment for following lines and images (ESC a n).
    SetAlign(Alignment),

    /// Set character size multipliers (GS ! n). 1 = normal.
    SetSize { width: u8, height: u8 },

    /// Text without trailing newline. Encoded to CP437 at codegen.
    Text(String),

    /// Line feed.
    Newline,

    /// Back to normal 1x1 text. Enlarged text must end with this or the
    /// printer stays enlarged for the next job.
    ResetSize,

    /// Raster image (logo).
    Image(Raster),

    /// QR code, already encoded and rasterized.
    QrCode { data: String, raster: Raster },
}

impl Op {
    /// True for opcodes that print an image (not QR codes).
    pub fn is_image(&self) -> bool {
        matches!(self, Op::Image(_))
    }
}

/// An immutable ESC/POS print job.
///
/// Produced fresh per print request by the receipt builder and consumed once
/// by [`EscposDocument::into_bytes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EscposDocument {
    ops: Vec<Op>,
}

impl EscposDocument {
    /// Wrap an op sequence.
    pub fn from_ops(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    /// All opcodes in print order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn first(&self) -> Option<&Op> {
        self.ops.first()
    }

    pub fn last(&self) -> Option<&Op> {
        self.ops.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Op> {
        self.ops.iter()
    }

    /// Count `Text` ops whose content equals `needle`.
    pub fn count_text(&self, needle: &str) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Text(t) if t == needle))
            .count()
    }
}

impl FromIterator<Op> for EscposDocument {
    fn from_iter<T: IntoIterator<Item = Op>>(iter: T) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EscposDocument {
    type Item = &'a Op;
    type IntoIter = std::slice::Iter<'a, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_accessors() {
        let doc = EscposDocument::from_ops(vec![
            Op::SetAlign(Alignment::Center),
            Op::Text("CODE: X".into()),
            Op::Newline,
        ]);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.first(), Some(&Op::SetAlign(Alignment::Center)));
        assert_eq!(doc.last(), Some(&Op::Newline));
        assert_eq!(doc.count_text("CODE: X"), 1);
        assert_eq!(doc.count_text("CODE"), 0);
    }

    #[test]
    fn test_raster_debug_is_compact() {
        let raster = Raster {
            width: 16,
            height: 2,
            data: vec![0; 4],
        };
        assert_eq!(format!("{:?}", raster), "Raster(16x2, 4 bytes)");
        assert_eq!(raster.width_bytes(), 2);
    }

    #[test]
    fn test_is_image() {
        let raster = Raster {
            width: 8,
            height: 1,
            data: vec![0xFF],
        };
        assert!(Op::Image(raster.clone()).is_image());
        assert!(
            !Op::QrCode {
                data: "x".into(),
                raster
            }
            .is_image()
        );
    }
}
