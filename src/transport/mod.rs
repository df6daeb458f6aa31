//! # Printer Transport Layer
//!
//! Byte delivery to physical printers.
//!
//! ## Available Transports
//!
//! - [`ble`]: Bluetooth LE GATT writes, driven by a dedicated runtime thread
//! - [`usb`]: USB bulk transfers via libusb
//!
//! Both sit behind small traits ([`ble::BleBackend`], [`usb::UsbBus`]) so the
//! coordinator can be exercised without hardware.

pub mod ble;
pub mod btle;
pub mod usb;

pub use ble::{BleTimeouts, BleTransport, ConnectionState, DiscoveredDevice};
pub use btle::BtleplugBackend;
pub use usb::{DiscoveredPrinter, RusbBus, UsbDelivery, UsbTransport};
