//! # Printer Module
//!
//! Which printers exist and which one jobs go to.
//!
//! ## Modules
//!
//! - [`registry`]: Scan results, USB allow-list, current selection
//! - [`config`]: Persisted mode and device choices

pub mod config;
pub mod registry;

pub use config::{ConfigStore, ThermalMode, ThermalSettings};
pub use registry::{BleSelection, DeviceRegistry, PrinterSelection};
