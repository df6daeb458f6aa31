//! # ESC/POS Protocol Implementation
//!
//! Low-level command builders for ESC/POS thermal receipt printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Basic printer commands (init, line feed)
//! - [`text`]: Alignment and character size
//! - [`graphics`]: Raster bit images (`GS v 0`)
//! - [`cp437`]: Text encoding for the printer's default code page
//!
//! ## Usage Example
//!
//! ```
//! use thermal_bridge::protocol::{commands, cp437, text};
//!
//! let mut data = Vec::new();
//! data.extend(text::align(text::Alignment::Center));
//! data.extend(text::size(2, 2));
//! data.extend(cp437::encode("SCAN QR"));
//! data.extend(commands::line_feed());
//! data.extend(text::size_normal());
//! ```

pub mod commands;
pub mod cp437;
pub mod graphics;
pub mod text;
