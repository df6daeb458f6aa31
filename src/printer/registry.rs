//! # Device Registry
//!
//! Tracks the printers found by the last scan of each transport and which one
//! is selected.
//!
//! ## USB Allow-List
//!
//! Only devices from vendors that ship ESC/POS thermal printers are listed:
//!
//! | Vendor ID | Vendor |
//! |-----------|--------|
//! | 0x0416 | Winbond (Xprinter, most 58mm clones) |
//! | 0x0FE6 | ICS Advent (POS-58 family) |
//! | 0x28E9 | GigaDevice (GD32 based printers) |
//! | 0x04B8 | Seiko Epson |
//! | 0x067B | Prolific (USB-serial bridged printers) |
//!
//! plus the single product `0x6868:0x0500`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{ThermalMode, ThermalSettings};
use crate::error::BleError;
use crate::transport::ble::{DiscoveredDevice, parse_uuid};
use crate::transport::usb::{DiscoveredPrinter, UsbBus, UsbStrings};

/// Vendors whose devices are treated as thermal printers.
pub const ALLOWED_VENDORS: [u16; 5] = [0x0416, 0x0FE6, 0x28E9, 0x04B8, 0x067B];

/// Individual `(vendor, product)` pairs outside the allowed vendors.
pub const ALLOWED_PRODUCTS: [(u16, u16); 1] = [(0x6868, 0x0500)];

pub fn is_thermal_printer(vendor_id: u16, product_id: u16) -> bool {
    ALLOWED_VENDORS.contains(&vendor_id) || ALLOWED_PRODUCTS.contains(&(vendor_id, product_id))
}

/// Selected BLE device and its write target. Fields are set independently:
/// the address by selection, the UUIDs by detection or manual override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BleSelection {
    pub address: Option<String>,
    pub name: Option<String>,
    pub service_uuid: Option<Uuid>,
    pub char_uuid: Option<Uuid>,
}

/// The active mode plus the chosen device for each transport.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrinterSelection {
    pub mode: ThermalMode,
    pub usb: Option<DiscoveredPrinter>,
    pub ble: BleSelection,
}

/// Scan results and the current selection.
pub struct DeviceRegistry {
    bus: Arc<dyn UsbBus>,
    usb_printers: Vec<DiscoveredPrinter>,
    ble_devices: Vec<DiscoveredDevice>,
    selection: PrinterSelection,
}

impl DeviceRegistry {
    pub fn new(bus: Arc<dyn UsbBus>) -> Self {
        Self {
            bus,
            usb_printers: Vec::new(),
            ble_devices: Vec::new(),
            selection: PrinterSelection::default(),
        }
    }

    pub fn selection(&self) -> &PrinterSelection {
        &self.selection
    }

    pub fn usb_printers(&self) -> &[DiscoveredPrinter] {
        &self.usb_printers
    }

    pub fn ble_devices(&self) -> &[DiscoveredDevice] {
        &self.ble_devices
    }

    /// Enumerate USB devices and keep the allow-listed ones. Enumeration
    /// failure yields an empty list; an unreadable device is skipped.
    pub fn scan_usb(&mut self) -> &[DiscoveredPrinter] {
        let devices = match self.bus.devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("USB discovery error: {}", e);
                Vec::new()
            }
        };

        let mut printers = Vec::new();
        for handle in devices {
            let (vendor_id, product_id) = match handle.ids() {
                Ok(ids) => ids,
                Err(e) => {
                    debug!("Skipping unreadable USB device {:?}: {}", handle, e);
                    continue;
                }
            };
            if !is_thermal_printer(vendor_id, product_id) {
                continue;
            }
            let strings = handle.strings().unwrap_or_else(|e| {
                debug!("USB strings unavailable for {:04x}:{:04x}: {}", vendor_id, product_id, e);
                UsbStrings::default()
            });
            printers.push(DiscoveredPrinter {
                vendor_id,
                product_id,
                manufacturer: strings.manufacturer,
                product: strings.product,
                serial: strings.serial,
                handle,
            });
        }

        info!("Found {} USB thermal printers", printers.len());
        self.usb_printers = printers;
        &self.usb_printers
    }

    /// Replace the BLE list with a scan result; a failed scan clears it.
    pub fn record_ble_scan(
        &mut self,
        result: Result<Vec<DiscoveredDevice>, BleError>,
    ) -> &[DiscoveredDevice] {
        self.ble_devices = result.unwrap_or_else(|e| {
            warn!("BLE scan error: {}", e);
            Vec::new()
        });
        &self.ble_devices
    }

    /// Select the device at `index` of the last scan for `transport`. An
    /// out-of-range index clears the selection. Returns whether a device is
    /// now selected.
    pub fn select(&mut self, transport: ThermalMode, index: usize) -> bool {
        match transport {
            ThermalMode::Usb => {
                self.selection.usb = self.usb_printers.get(index).cloned();
                match &self.selection.usb {
                    Some(p) => info!("Selected USB printer {}", p.display_name()),
                    None => debug!("USB selection cleared"),
                }
                self.selection.usb.is_some()
            }
            ThermalMode::Ble => match self.ble_devices.get(index) {
                Some(device) => {
                    info!("Selected BLE device {}", device.display_name());
                    self.selection.ble = BleSelection {
                        address: Some(device.address.clone()),
                        name: Some(device.name.clone()),
                        service_uuid: None,
                        char_uuid: None,
                    };
                    true
                }
                None => {
                    debug!("BLE selection cleared");
                    self.selection.ble.address = None;
                    self.selection.ble.name = None;
                    false
                }
            },
        }
    }

    pub fn set_mode(&mut self, mode: ThermalMode) {
        self.selection.mode = mode;
    }

    pub fn set_ble_characteristic(&mut self, service: Uuid, characteristic: Uuid) {
        self.selection.ble.service_uuid = Some(service);
        self.selection.ble.char_uuid = Some(characteristic);
    }

    /// Apply persisted settings. The saved USB printer is matched against the
    /// last USB scan, so scan first.
    pub fn restore(&mut self, settings: &ThermalSettings) {
        self.selection.mode = settings.mode;

        let usb = &settings.usb;
        self.selection.usb = match (usb.vendor_id, usb.product_id) {
            (Some(vid), Some(pid)) => {
                let found = self
                    .usb_printers
                    .iter()
                    .find(|p| p.matches(vid, pid, usb.serial.as_deref()))
                    .cloned();
                if found.is_none() {
                    info!("Saved USB printer {:04x}:{:04x} not connected", vid, pid);
                }
                found
            }
            _ => None,
        };

        let ble = &settings.ble;
        self.selection.ble = BleSelection {
            address: non_empty(&ble.address),
            name: None,
            service_uuid: restore_uuid(&ble.service_uuid),
            char_uuid: restore_uuid(&ble.char_uuid),
        };
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn restore_uuid(s: &str) -> Option<Uuid> {
    let s = non_empty(s)?;
    parse_uuid(&s)
        .map_err(|e| warn!("Ignoring saved UUID: {}", e))
        .ok()
}
