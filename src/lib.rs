//! # Thermal Bridge - Download Receipts on Thermal Printers
//!
//! Thermal Bridge takes a download URL and a short code, lays out a receipt
//! with a QR code, and prints it on an ESC/POS thermal printer attached over
//! USB or Bluetooth LE. It provides:
//!
//! - **Protocol implementation**: ESC/POS command builders
//! - **Receipt layout**: logo, QR code, code line, call to action, footer
//! - **Transports**: USB bulk (libusb) and BLE GATT writes (btleplug)
//! - **Device management**: discovery, selection, persisted settings
//! - **HTTP server**: `POST /print/thermal` and device controls
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use thermal_bridge::{
//!     coordinator::{PrintCoordinator, TransportState},
//!     printer::ConfigStore,
//!     receipt::ReceiptBuilder,
//!     transport::{BleTransport, BtleplugBackend, RusbBus},
//! };
//!
//! let transports = TransportState::start(
//!     Arc::new(RusbBus),
//!     BleTransport::new(BtleplugBackend::new()),
//!     Some(ConfigStore::new("thermal_printer_settings.json")),
//! );
//! let coordinator = PrintCoordinator::new(transports, ReceiptBuilder::new().logo("assets/logo.png"));
//!
//! let receipt = coordinator.print("https://dl.example.com/s/ABC123", "ABC123")?;
//! println!("sent {} bytes via {}", receipt.bytes, receipt.mode);
//! # Ok::<(), thermal_bridge::error::PrintError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS command builders |
//! | [`ir`] | Print job opcodes and codegen |
//! | [`render`] | Dithering, logo and QR rasterization |
//! | [`receipt`] | Download receipt layout |
//! | [`transport`] | USB and BLE backends |
//! | [`printer`] | Device registry and persisted settings |
//! | [`coordinator`] | Print job orchestration |
//! | [`server`] | HTTP API |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Generic 58mm ESC/POS printers (Xprinter, POS-58 clones, Epson TM series
//! over USB; MPT/PT series and similar over BLE).

pub mod coordinator;
pub mod error;
pub mod ir;
pub mod printer;
pub mod protocol;
pub mod receipt;
pub mod render;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use coordinator::PrintCoordinator;
pub use error::{BridgeError, ErrorKind, PrintError};
pub use receipt::ReceiptBuilder;
