//! # Receipt Builder
//!
//! Builds the download receipt printed for every job: a centered logo, a QR
//! code pointing at the download URL, the human-readable code, a large call to
//! action and the studio attribution footer.
//!
//! ```text
//!          [ logo ]
//! -------------------------------
//!          [  QR  ]
//!       CODE: ABC123
//!
//!        SCAN QR          (2x2)
//!      TO DOWNLOAD        (1x2)
//!
//! -------------------------------
//!   powered by Tholee Studio
//! @tholee.studio | 0895 2500 9655
//! -------------------------------
//! ```
//!
//! Sections that cannot be rendered (missing logo, oversized QR payload) are
//! logged and skipped; the rest of the receipt still prints.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::ir::{EscposDocument, Op};
use crate::protocol::text::Alignment;
use crate::render::{self, MAX_WIDTH_DOTS, qr};

/// Horizontal rule, sized for 58mm paper in font A.
pub const SEPARATOR: &str = "-------------------------------";

/// Footer lines printed under the call to action.
pub const ATTRIBUTION: [&str; 2] = ["powered by Tholee Studio", "@tholee.studio | 0895 2500 9655"];

/// Language of the call-to-action lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Id,
}

impl Locale {
    /// Call-to-action lines with their (width, height) multipliers.
    pub fn headline(self) -> [(&'static str, u8, u8); 2] {
        match self {
            Locale::En => [("SCAN QR", 2, 2), ("TO DOWNLOAD", 1, 2)],
            Locale::Id => [("SCAN QR", 2, 2), ("UNTUK DOWNLOAD", 1, 2)],
        }
    }
}

/// Builds [`EscposDocument`]s for print requests.
///
/// Holds only configuration; every call to [`ReceiptBuilder::build`] produces
/// a fresh document.
#[derive(Debug, Clone)]
pub struct ReceiptBuilder {
    logo: Option<PathBuf>,
    locale: Locale,
    module_size: u8,
    max_width: u32,
}

impl Default for ReceiptBuilder {
    fn default() -> Self {
        Self {
            logo: None,
            locale: Locale::En,
            module_size: qr::DEFAULT_MODULE_SIZE,
            max_width: MAX_WIDTH_DOTS,
        }
    }
}

impl ReceiptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print this image above the QR code when the file exists.
    pub fn logo(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo = Some(path.into());
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn logo_path(&self) -> Option<&Path> {
        self.logo.as_deref()
    }

    /// Build the receipt for a download `url` and its short `code`.
    pub fn build(&self, url: &str, code: &str) -> EscposDocument {
        let mut ops = vec![Op::SetAlign(Alignment::Center)];

        if let Some(path) = &self.logo {
            match render::logo::load(path, self.max_width) {
                Ok(raster) => ops.push(Op::Image(raster)),
                Err(e) => warn!(kind = ?ErrorKind::ProtocolBuild, "Logo skipped: {}", e),
            }
        }

        line(&mut ops, SEPARATOR);

        match qr::render(url, self.module_size, self.max_width) {
            Ok(raster) => ops.push(Op::QrCode {
                data: url.to_string(),
                raster,
            }),
            Err(e) => warn!(kind = ?ErrorKind::ProtocolBuild, "Failed to add QR: {}", e),
        }

        line(&mut ops, &format!("CODE: {}", code));
        ops.push(Op::Newline);

        for (text, width, height) in self.locale.headline() {
            ops.push(Op::SetSize { width, height });
            line(&mut ops, text);
        }
        ops.push(Op::ResetSize);
        ops.push(Op::Newline);

        line(&mut ops, SEPARATOR);
        for text in ATTRIBUTION {
            line(&mut ops, text);
        }
        line(&mut ops, SEPARATOR);

        // tear-off margin
        ops.push(Op::Newline);
        ops.push(Op::Newline);

        debug!(ops = ops.len(), "receipt built");
        EscposDocument::from_ops(ops)
    }
}

fn line(ops: &mut Vec<Op>, text: &str) {
    ops.push(Op::Text(text.to_string()));
    ops.push(Op::Newline);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    const URL: &str = "https://dl.tholee.studio/s/ABC123";

    #[test]
    fn test_layout_boundaries() {
        let doc = ReceiptBuilder::new().build(URL, "ABC123");
        assert_eq!(doc.first(), Some(&Op::SetAlign(Alignment::Center)));
        assert_eq!(doc.last(), Some(&Op::Newline));
    }

    #[test]
    fn test_code_line_appears_once() {
        let doc = ReceiptBuilder::new().build(URL, "ABC123");
        assert_eq!(doc.count_text("CODE: ABC123"), 1);
    }

    #[test]
    fn test_qr_carries_url() {
        let doc = ReceiptBuilder::new().build(URL, "ABC123");
        let qr: Vec<_> = doc
            .iter()
            .filter_map(|op| match op {
                Op::QrCode { data, .. } => Some(data.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(qr, vec![URL]);
    }

    #[test]
    fn test_size_reset_after_headline() {
        let doc = ReceiptBuilder::new().build(URL, "ABC123");
        let ops = doc.ops();
        let headline = ops
            .iter()
            .position(|op| op == &Op::Text("TO DOWNLOAD".into()))
            .unwrap();
        assert_eq!(ops[headline + 2], Op::ResetSize);
        assert_eq!(ops[headline - 1], Op::SetSize { width: 1, height: 2 });
    }

    #[test]
    fn test_missing_logo_only_drops_image() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("logo.png");
        RgbaImage::from_pixel(64, 16, Rgba([0, 0, 0, 255]))
            .save(&present)
            .unwrap();

        let with_logo = ReceiptBuilder::new().logo(&present).build(URL, "ABC123");
        let without = ReceiptBuilder::new()
            .logo(dir.path().join("absent.png"))
            .build(URL, "ABC123");

        assert_eq!(with_logo.iter().filter(|op| op.is_image()).count(), 1);
        let stripped: EscposDocument = with_logo
            .iter()
            .filter(|op| !op.is_image())
            .cloned()
            .collect();
        assert_eq!(stripped, without);
    }

    #[test]
    fn test_oversized_url_skips_qr() {
        let url = "https://example.com/".to_string() + &"x".repeat(4000);
        let doc = ReceiptBuilder::new().build(&url, "ABC123");
        assert!(!doc.iter().any(|op| matches!(op, Op::QrCode { .. })));
        assert_eq!(doc.count_text("CODE: ABC123"), 1);
    }

    #[test]
    fn test_indonesian_headline() {
        let doc = ReceiptBuilder::new()
            .locale(Locale::Id)
            .build(URL, "ABC123");
        assert_eq!(doc.count_text("UNTUK DOWNLOAD"), 1);
        assert_eq!(doc.count_text("TO DOWNLOAD"), 0);
    }

    #[test]
    fn test_footer() {
        let doc = ReceiptBuilder::new().build(URL, "ABC123");
        assert_eq!(doc.count_text(SEPARATOR), 3);
        for text in ATTRIBUTION {
            assert_eq!(doc.count_text(text), 1);
        }
    }
}
