//! # Intermediate Representation (IR)
//!
//! The IR is the "bytecode" between the receipt layout and raw ESC/POS bytes.
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐     ┌──────────┐     ┌───────────┐
//! │   Receipt   │ ──► │ EscposDocument │ ──► │ Codegen  │ ──► │ Transport │
//! │   builder   │     │   (Vec<Op>)    │     │ (bytes)  │     │ USB / BLE │
//! └─────────────┘     └────────────────┘     └──────────┘     └───────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use thermal_bridge::ir::{EscposDocument, Op};
//! use thermal_bridge::protocol::text::Alignment;
//!
//! let doc = EscposDocument::from_ops(vec![
//!     Op::SetAlign(Alignment::Center),
//!     Op::Text("HELLO".into()),
//!     Op::Newline,
//! ]);
//!
//! let bytes = doc.into_bytes();
//! assert_eq!(&bytes[..3], &[0x1B, 0x61, 0x01]);
//! ```

mod codegen;
mod ops;

pub use ops::*;
