//! # Print Coordinator
//!
//! Entry point for print jobs and device management. Owns the transports and
//! the registry ([`TransportState`]), builds receipts, and routes the bytes to
//! the transport of the active mode.
//!
//! ```text
//! print(url, code)
//!   ├─ validate input            → Validation
//!   ├─ resolve selected device   → DeviceNotSelected
//!   ├─ ReceiptBuilder::build     (sections degrade, never fail)
//!   ├─ codegen → bytes
//!   └─ USB bulk / BLE GATT write → Connection / Transfer
//! ```
//!
//! All methods block; async callers should use `spawn_blocking`. USB jobs are
//! serialized by a mutex; BLE jobs are serialized by the BLE runtime thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PrintError;
use crate::printer::{
    BleSelection, ConfigStore, DeviceRegistry, PrinterSelection, ThermalMode, ThermalSettings,
};
use crate::protocol::commands;
use crate::receipt::ReceiptBuilder;
use crate::transport::ble::{self, BleTransport, ConnectionState, DiscoveredDevice};
use crate::transport::usb::{DiscoveredPrinter, UsbBus, UsbTransport};

/// Transports, registry and settings store, with their lifecycle.
pub struct TransportState {
    registry: Mutex<DeviceRegistry>,
    ble: BleTransport,
    usb: UsbTransport,
    store: Option<ConfigStore>,
}

impl TransportState {
    /// Scan USB once and apply the saved settings, if a store is given.
    pub fn start(bus: Arc<dyn UsbBus>, ble: BleTransport, store: Option<ConfigStore>) -> Self {
        let mut registry = DeviceRegistry::new(bus);
        registry.scan_usb();
        if let Some(store) = &store {
            registry.restore(&store.load());
        }
        Self {
            registry: Mutex::new(registry),
            ble,
            usb: UsbTransport::new(),
            store,
        }
    }

    pub fn ble(&self) -> &BleTransport {
        &self.ble
    }

    /// Disconnect BLE and stop its runtime thread.
    pub fn shutdown(&self) {
        info!("Shutting down transports");
        self.ble.shutdown();
    }

    fn registry(&self) -> MutexGuard<'_, DeviceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let settings = ThermalSettings::from_selection(self.registry().selection());
        if let Err(e) = store.save(&settings) {
            warn!("Failed to save printer settings: {}", e);
        }
    }
}

/// Device identity a job went to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PrinterIdentity {
    Usb {
        vendor_id: String,
        product_id: String,
        serial: Option<String>,
        name: String,
    },
    Ble {
        address: String,
        service_uuid: Uuid,
        char_uuid: Uuid,
    },
}

/// Result of a successful job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReceipt {
    pub job_id: Uuid,
    pub mode: ThermalMode,
    pub printer: PrinterIdentity,
    pub bytes: usize,
    /// USB only: a chunk timed out and the tail was not sent.
    pub partial: bool,
    pub printed_at: String,
}

/// Snapshot for `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    pub mode: ThermalMode,
    pub usb_printer: Option<String>,
    pub ble: BleSelection,
    pub ble_state: ConnectionState,
}

enum Target {
    Usb(DiscoveredPrinter),
    Ble {
        address: String,
        service: Uuid,
        characteristic: Uuid,
    },
}

pub struct PrintCoordinator {
    transports: TransportState,
    receipts: ReceiptBuilder,
    usb_jobs: Mutex<()>,
}

impl PrintCoordinator {
    pub fn new(transports: TransportState, receipts: ReceiptBuilder) -> Self {
        Self {
            transports,
            receipts,
            usb_jobs: Mutex::new(()),
        }
    }

    pub fn transports(&self) -> &TransportState {
        &self.transports
    }

    /// Print a receipt for `url`/`code` on the active mode's printer.
    pub fn print(&self, url: &str, code: &str) -> Result<JobReceipt, PrintError> {
        let url = url.trim();
        let code = code.trim();
        if url.is_empty() {
            return Err(PrintError::MissingField("url"));
        }
        if code.is_empty() {
            return Err(PrintError::MissingField("code"));
        }

        let mode = self.selection().mode;
        let result = self.resolve(mode).and_then(|target| {
            let mut bytes = commands::init();
            bytes.extend(self.receipts.build(url, code).into_bytes());
            self.send(mode, target, bytes)
        });

        match &result {
            Ok(receipt) => info!(
                job = %receipt.job_id,
                bytes = receipt.bytes,
                partial = receipt.partial,
                "{} print job sent successfully",
                mode
            ),
            Err(e) => error!(kind = ?e.kind(), "{} thermal print error: {}", mode, e),
        }
        result
    }

    fn resolve(&self, mode: ThermalMode) -> Result<Target, PrintError> {
        let registry = self.transports.registry();
        let selection = registry.selection();
        match mode {
            ThermalMode::Usb => selection
                .usb
                .clone()
                .map(Target::Usb)
                .ok_or(PrintError::NoDeviceSelected(ThermalMode::Usb)),
            ThermalMode::Ble => {
                let address = selection
                    .ble
                    .address
                    .clone()
                    .ok_or(PrintError::NoDeviceSelected(ThermalMode::Ble))?;
                match (selection.ble.service_uuid, selection.ble.char_uuid) {
                    (Some(service), Some(characteristic)) => Ok(Target::Ble {
                        address,
                        service,
                        characteristic,
                    }),
                    _ => Err(PrintError::MissingCharacteristic),
                }
            }
        }
    }

    fn send(
        &self,
        mode: ThermalMode,
        target: Target,
        bytes: Vec<u8>,
    ) -> Result<JobReceipt, PrintError> {
        let total = bytes.len();
        let (printer, partial) = match target {
            Target::Usb(printer) => {
                let _job = self.usb_jobs.lock().unwrap_or_else(PoisonError::into_inner);
                let delivery = self.transports.usb.send(&printer, &bytes)?;
                let identity = PrinterIdentity::Usb {
                    vendor_id: format!("0x{:04X}", printer.vendor_id),
                    product_id: format!("0x{:04X}", printer.product_id),
                    serial: printer.serial.clone(),
                    name: printer.display_name(),
                };
                (identity, delivery.is_partial())
            }
            Target::Ble {
                address,
                service,
                characteristic,
            } => {
                self.transports.ble.send(&address, characteristic, bytes)?;
                (
                    PrinterIdentity::Ble {
                        address,
                        service_uuid: service,
                        char_uuid: characteristic,
                    },
                    false,
                )
            }
        };

        Ok(JobReceipt {
            job_id: Uuid::new_v4(),
            mode,
            printer,
            bytes: total,
            partial,
            printed_at: chrono::Local::now().to_rfc3339(),
        })
    }

    pub fn selection(&self) -> PrinterSelection {
        self.transports.registry().selection().clone()
    }

    pub fn status(&self) -> BridgeStatus {
        let selection = self.selection();
        BridgeStatus {
            mode: selection.mode,
            usb_printer: selection.usb.as_ref().map(DiscoveredPrinter::display_name),
            ble: selection.ble,
            ble_state: self.transports.ble.state(),
        }
    }

    pub fn scan_usb(&self) -> Vec<DiscoveredPrinter> {
        self.transports.registry().scan_usb().to_vec()
    }

    pub fn scan_ble(&self, timeout: Duration) -> Vec<DiscoveredDevice> {
        // the scan itself runs without the registry lock
        let result = self.transports.ble.scan(timeout);
        self.transports.registry().record_ble_scan(result).to_vec()
    }

    /// Select a USB printer from the last scan; out of range clears it.
    pub fn select_usb(&self, index: usize) -> Option<DiscoveredPrinter> {
        let selected = {
            let mut registry = self.transports.registry();
            registry.select(ThermalMode::Usb, index);
            registry.selection().usb.clone()
        };
        self.transports.persist();
        selected
    }

    /// Select a BLE device from the last scan, connect, and detect its
    /// writable characteristic. Out of range clears the selection and
    /// disconnects. A failed detection leaves the UUIDs unset for manual
    /// entry; the address is still selected and saved.
    pub fn select_ble(&self, index: usize) -> BleSelection {
        let address = {
            let mut registry = self.transports.registry();
            registry.select(ThermalMode::Ble, index);
            registry.selection().ble.address.clone()
        };

        match &address {
            Some(address) => {
                if self.detect_for(address).is_err() {
                    warn!("Could not detect BLE UUIDs, please enter them manually");
                }
            }
            None => self.transports.ble.disconnect(),
        }
        self.transports.persist();
        self.selection().ble
    }

    /// Re-run characteristic detection on the selected BLE device.
    pub fn detect_characteristics(&self) -> Result<(Uuid, Uuid), PrintError> {
        let address = self
            .selection()
            .ble
            .address
            .ok_or(PrintError::NoDeviceSelected(ThermalMode::Ble))?;
        let found = self.detect_for(&address)?;
        self.transports.persist();
        Ok(found)
    }

    fn detect_for(&self, address: &str) -> Result<(Uuid, Uuid), PrintError> {
        let (service, characteristic) = self
            .transports
            .ble
            .detect_characteristics(address)
            .inspect_err(|e| warn!("BLE detect failed for {}: {}", address, e))?;
        self.transports
            .registry()
            .set_ble_characteristic(service, characteristic);
        Ok((service, characteristic))
    }

    /// Override the write target with user-supplied UUIDs.
    pub fn set_ble_uuids(&self, service: &str, characteristic: &str) -> Result<(), PrintError> {
        let service = ble::parse_uuid(service)?;
        let characteristic = ble::parse_uuid(characteristic)?;
        self.transports
            .registry()
            .set_ble_characteristic(service, characteristic);
        info!("BLE UUIDs set: service {} characteristic {}", service, characteristic);
        self.transports.persist();
        Ok(())
    }

    pub fn disconnect_ble(&self) {
        self.transports.ble.disconnect();
    }

    pub fn set_mode(&self, mode: ThermalMode) {
        self.transports.registry().set_mode(mode);
        info!("Thermal mode set to {}", mode);
        self.transports.persist();
    }

    pub fn shutdown(&self) {
        self.transports.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::ble::mock::{MockBackend, Recorder, WriteMode};
    use crate::transport::usb::mock::{Calls, MockBus, MockDevice};
    use pretty_assertions::assert_eq;

    struct Rig {
        coordinator: PrintCoordinator,
        ble: Arc<Recorder>,
        usb: Arc<Mutex<Calls>>,
        _dir: tempfile::TempDir,
    }

    fn rig_with(write_mode: WriteMode) -> Rig {
        let (device_handle, usb) = MockDevice::printer(0x0416, 0x5011, Some("A1")).handle();
        let bus = MockBus {
            devices: vec![device_handle],
        };
        let (mut backend, ble) = MockBackend::new();
        backend.write_mode = write_mode;
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("settings.json"));
        let transports = TransportState::start(
            Arc::new(bus),
            BleTransport::new(backend),
            Some(store),
        );
        Rig {
            coordinator: PrintCoordinator::new(transports, ReceiptBuilder::new()),
            ble,
            usb,
            _dir: dir,
        }
    }

    fn rig() -> Rig {
        rig_with(WriteMode::Ok)
    }

    fn written(rec: &Recorder) -> Vec<u8> {
        rec.writes.lock().unwrap().concat()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_missing_fields_are_validation_errors() {
        let rig = rig();
        let err = rig.coordinator.print("", "ABC").unwrap_err();
        assert_eq!(err, PrintError::MissingField("url"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            rig.coordinator.print("https://x", "  ").unwrap_err(),
            PrintError::MissingField("code")
        );
    }

    #[test]
    fn test_usb_print_without_selection() {
        let rig = rig();
        let err = rig.coordinator.print("https://x", "ABC").unwrap_err();
        assert_eq!(err, PrintError::NoDeviceSelected(ThermalMode::Usb));
        assert_eq!(err.kind(), ErrorKind::DeviceNotSelected);
    }

    #[test]
    fn test_usb_print() {
        let rig = rig();
        assert!(rig.coordinator.select_usb(0).is_some());
        let receipt = rig.coordinator.print("https://x.test/a", "ABC123").unwrap();
        assert_eq!(receipt.mode, ThermalMode::Usb);
        assert!(!receipt.partial);
        assert!(matches!(receipt.printer, PrinterIdentity::Usb { ref vendor_id, .. } if vendor_id == "0x0416"));
        let calls = rig.usb.lock().unwrap();
        assert_eq!(calls.writes.iter().sum::<usize>(), receipt.bytes);
        assert_eq!(calls.released, 1);
    }

    #[test]
    fn test_ble_print_end_to_end() {
        let rig = rig();
        rig.coordinator.set_mode(ThermalMode::Ble);
        rig.coordinator.scan_ble(Duration::from_millis(10));
        rig.coordinator.select_ble(0);

        let receipt = rig.coordinator.print("https://x.test/a", "ABC123").unwrap();
        let bytes = written(&rig.ble);
        assert_eq!(bytes.len(), receipt.bytes);
        assert!(contains(&bytes, b"CODE: ABC123"));
        assert_eq!(&bytes[..2], &[0x1B, 0x40]);
        // select connected once; the print reused the link
        assert_eq!(rig.ble.connects(), 1);
    }

    #[test]
    fn test_ble_without_characteristic() {
        let rig = rig();
        rig.coordinator.set_mode(ThermalMode::Ble);
        assert_eq!(
            rig.coordinator.print("https://x", "ABC").unwrap_err(),
            PrintError::NoDeviceSelected(ThermalMode::Ble)
        );
        rig.coordinator.scan_ble(Duration::from_millis(10));
        {
            let mut registry = rig.coordinator.transports.registry();
            registry.select(ThermalMode::Ble, 0);
        }
        assert_eq!(
            rig.coordinator.print("https://x", "ABC").unwrap_err(),
            PrintError::MissingCharacteristic
        );
    }

    #[test]
    fn test_ble_write_failure_surfaces_transfer_error() {
        let rig = rig_with(WriteMode::FailAt(2));
        rig.coordinator.set_mode(ThermalMode::Ble);
        rig.coordinator.scan_ble(Duration::from_millis(10));
        rig.coordinator.select_ble(0);

        let err = rig.coordinator.print("https://x.test/a", "ABC123").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert_eq!(
            rig.coordinator.status().ble_state,
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_ble_select_out_of_range_disconnects() {
        let rig = rig();
        rig.coordinator.scan_ble(Duration::from_millis(10));
        rig.coordinator.select_ble(0);
        assert_eq!(rig.coordinator.status().ble_state, ConnectionState::Connected);

        rig.coordinator.select_ble(9);
        let status = rig.coordinator.status();
        assert_eq!(status.ble.address, None);
        assert_eq!(status.ble_state, ConnectionState::Disconnected);
        assert_eq!(rig.ble.disconnects(), 1);
    }

    #[test]
    fn test_set_uuids_validates() {
        let rig = rig();
        let err = rig.coordinator.set_ble_uuids("ffe0", "bogus").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        rig.coordinator.set_ble_uuids("ffe0", "ffe1").unwrap();
        assert_eq!(
            rig.coordinator.selection().ble.char_uuid.unwrap().to_string(),
            "0000ffe1-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_selection_survives_restart() {
        let rig = rig();
        rig.coordinator.select_usb(0);
        rig.coordinator.set_mode(ThermalMode::Ble);
        rig.coordinator.set_ble_uuids("ffe0", "ffe1").unwrap();

        let store = ConfigStore::new(rig._dir.path().join("settings.json"));
        let (handle, _) = MockDevice::printer(0x0416, 0x5011, Some("A1")).handle();
        let (backend, _) = MockBackend::new();
        let restarted = TransportState::start(
            Arc::new(MockBus {
                devices: vec![handle],
            }),
            BleTransport::new(backend),
            Some(store),
        );
        let selection = restarted.registry().selection().clone();
        assert_eq!(selection.mode, ThermalMode::Ble);
        assert_eq!(selection.usb.unwrap().serial.as_deref(), Some("A1"));
        assert!(selection.ble.char_uuid.is_some());
    }
}
