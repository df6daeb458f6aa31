//! # Persisted Printer Settings
//!
//! The active mode and device choices survive restarts in a small JSON file
//! (`thermal_printer_settings.json` by default):
//!
//! ```json
//! {
//!     "mode": "BLE",
//!     "usb": {},
//!     "ble": {
//!         "address": "AA:BB:CC:DD:EE:FF",
//!         "service_uuid": "000018f0-0000-1000-8000-00805f9b34fb",
//!         "char_uuid": "00002af1-0000-1000-8000-00805f9b34fb"
//!     }
//! }
//! ```
//!
//! Unset USB fields are omitted; unset BLE fields are empty strings. A missing
//! or unreadable file loads as defaults.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::registry::PrinterSelection;
use crate::error::ConfigError;

/// Default settings file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "thermal_printer_settings.json";

/// Which transport print jobs use.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ThermalMode {
    #[default]
    #[serde(rename = "USB", alias = "usb")]
    Usb,
    #[serde(rename = "BLE", alias = "ble")]
    Ble,
}

impl fmt::Display for ThermalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThermalMode::Usb => "USB",
            ThermalMode::Ble => "BLE",
        })
    }
}

/// Persisted USB identity. Extra descriptor strings are kept for humans
/// reading the file; matching uses vendor, product and serial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleRecord {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub service_uuid: String,
    #[serde(default)]
    pub char_uuid: String,
}

/// On-disk settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermalSettings {
    #[serde(default)]
    pub mode: ThermalMode,
    #[serde(default)]
    pub usb: UsbRecord,
    #[serde(default)]
    pub ble: BleRecord,
}

impl ThermalSettings {
    /// Snapshot the current selection.
    pub fn from_selection(selection: &PrinterSelection) -> Self {
        let usb = selection
            .usb
            .as_ref()
            .map(|p| UsbRecord {
                vendor_id: Some(p.vendor_id),
                product_id: Some(p.product_id),
                serial: p.serial.clone(),
                manufacturer: p.manufacturer.clone(),
                product: p.product.clone(),
            })
            .unwrap_or_default();

        let ble = &selection.ble;
        Self {
            mode: selection.mode,
            usb,
            ble: BleRecord {
                address: ble.address.clone().unwrap_or_default(),
                service_uuid: ble.service_uuid.map(|u| u.to_string()).unwrap_or_default(),
                char_uuid: ble.char_uuid.map(|u| u.to_string()).unwrap_or_default(),
            },
        }
    }
}

/// Reads and writes [`ThermalSettings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// malformed.
    pub fn load(&self) -> ThermalSettings {
        match self.try_load() {
            Ok(Some(settings)) => {
                info!("Loaded printer settings from {}", self.path.display());
                settings
            }
            Ok(None) => {
                debug!("No settings file at {}", self.path.display());
                ThermalSettings::default()
            }
            Err(e) => {
                warn!("Ignoring settings file {}: {}", self.path.display(), e);
                ThermalSettings::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<ThermalSettings>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Write settings as 4-space indented JSON.
    pub fn save(&self, settings: &ThermalSettings) -> Result<(), ConfigError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        settings.serialize(&mut ser)?;
        fs::write(&self.path, out)?;
        debug!("Saved printer settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join(DEFAULT_CONFIG_FILE));
        assert_eq!(store.load(), ThermalSettings::default());
    }

    #[test]
    fn test_malformed_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ConfigStore::new(path).load(), ThermalSettings::default());
    }

    #[test]
    fn test_reads_legacy_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"{
                "mode": "BLE",
                "usb": {"vendor_id": 1046, "product_id": 20497, "manufacturer": "Xprinter",
                        "product": "XP-58", "serial": null, "bus": 1},
                "ble": {"address": "AA:BB", "service_uuid": "", "char_uuid": ""}
            }"#,
        )
        .unwrap();

        let settings = ConfigStore::new(path).load();
        assert_eq!(settings.mode, ThermalMode::Ble);
        assert_eq!(settings.usb.vendor_id, Some(0x0416));
        assert_eq!(settings.usb.product_id, Some(0x5011));
        assert_eq!(settings.usb.serial, None);
        assert_eq!(settings.ble.address, "AA:BB");
    }

    #[test]
    fn test_save_writes_expected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join(DEFAULT_CONFIG_FILE));
        store.save(&ThermalSettings::default()).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            text,
            "{\n    \"mode\": \"USB\",\n    \"usb\": {},\n    \"ble\": {\n        \"address\": \"\",\n        \"service_uuid\": \"\",\n        \"char_uuid\": \"\"\n    }\n}"
        );
        assert_eq!(store.load(), ThermalSettings::default());
    }

    #[test]
    fn test_mode_display_and_serde() {
        assert_eq!(ThermalMode::Ble.to_string(), "BLE");
        assert_eq!(
            serde_json::from_str::<ThermalMode>("\"usb\"").unwrap(),
            ThermalMode::Usb
        );
        assert_eq!(serde_json::to_string(&ThermalMode::Ble).unwrap(), "\"BLE\"");
    }
}
