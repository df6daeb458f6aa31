//! In-memory printers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use thermal_bridge::error::{BleError, UsbError};
use thermal_bridge::transport::ble::{
    BleBackend, BleLink, CharacteristicInfo, DiscoveredDevice, parse_uuid,
};
use thermal_bridge::transport::usb::{UsbBus, UsbDevice, UsbHandle, UsbLink, UsbStrings};
use thermal_bridge::{
    PrintCoordinator, ReceiptBuilder,
    coordinator::TransportState,
    printer::ConfigStore,
    transport::BleTransport,
};

pub const BLE_ADDR: &str = "66:22:B2:0F:11:9A";

/// Bytes received by a fake printer, in write order.
pub type Sink = Arc<Mutex<Vec<u8>>>;

pub struct FakeBle {
    sink: Sink,
}

#[async_trait]
impl BleBackend for FakeBle {
    async fn scan(&mut self, _timeout: Duration) -> Result<Vec<DiscoveredDevice>, BleError> {
        Ok(vec![DiscoveredDevice {
            name: "MTP-II".into(),
            address: BLE_ADDR.into(),
        }])
    }

    async fn connect(&mut self, address: &str) -> Result<Box<dyn BleLink>, BleError> {
        if address != BLE_ADDR {
            return Err(BleError::ConnectFailed(format!("{} not in range", address)));
        }
        Ok(Box::new(FakeBleLink {
            sink: Arc::clone(&self.sink),
        }))
    }
}

struct FakeBleLink {
    sink: Sink,
}

#[async_trait]
impl BleLink for FakeBleLink {
    async fn characteristics(&mut self) -> Result<Vec<CharacteristicInfo>, BleError> {
        let service = parse_uuid("ff00")?;
        Ok(vec![
            CharacteristicInfo {
                service,
                uuid: parse_uuid("ff01")?,
                write: false,
                write_without_response: false,
            },
            CharacteristicInfo {
                service,
                uuid: parse_uuid("ff02")?,
                write: false,
                write_without_response: true,
            },
        ])
    }

    async fn write(&mut self, _characteristic: Uuid, chunk: &[u8]) -> Result<(), BleError> {
        assert!(chunk.len() <= 180, "chunk of {} bytes", chunk.len());
        self.sink.lock().unwrap().extend_from_slice(chunk);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BleError> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeUsbPrinter {
    sink: Sink,
}

impl UsbDevice for FakeUsbPrinter {
    fn ids(&self) -> Result<(u16, u16), UsbError> {
        Ok((0x0FE6, 0x811E))
    }

    fn strings(&self) -> Result<UsbStrings, UsbError> {
        Ok(UsbStrings {
            manufacturer: None,
            product: Some("POS58".into()),
            serial: None,
        })
    }

    fn open(&self) -> Result<Box<dyn UsbLink>, UsbError> {
        Ok(Box::new(FakeUsbLink {
            sink: Arc::clone(&self.sink),
        }))
    }
}

struct FakeUsbLink {
    sink: Sink,
}

impl UsbLink for FakeUsbLink {
    fn detach_kernel_driver(&mut self, _interface: u8) -> Result<(), UsbError> {
        Ok(())
    }

    fn set_active_configuration(&mut self) -> Result<(), UsbError> {
        Ok(())
    }

    fn out_endpoint(&mut self, _interface: u8) -> Result<Option<u8>, UsbError> {
        Ok(Some(0x01))
    }

    fn claim_interface(&mut self, _interface: u8) -> Result<(), UsbError> {
        Ok(())
    }

    fn write_bulk(
        &mut self,
        _endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, UsbError> {
        self.sink.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn release_interface(&mut self, _interface: u8) -> Result<(), UsbError> {
        Ok(())
    }
}

struct FakeBus {
    devices: Vec<UsbHandle>,
}

impl UsbBus for FakeBus {
    fn devices(&self) -> Result<Vec<UsbHandle>, UsbError> {
        Ok(self.devices.clone())
    }
}

/// A coordinator wired to one fake USB and one fake BLE printer.
pub struct Bench {
    pub coordinator: Arc<PrintCoordinator>,
    pub usb: Sink,
    pub ble: Sink,
    pub dir: tempfile::TempDir,
}

impl Bench {
    pub fn new() -> Self {
        let usb = Sink::default();
        let ble = Sink::default();
        let dir = tempfile::tempdir().unwrap();

        let bus = FakeBus {
            devices: vec![Arc::new(FakeUsbPrinter {
                sink: Arc::clone(&usb),
            })],
        };
        let transports = TransportState::start(
            Arc::new(bus),
            BleTransport::new(FakeBle {
                sink: Arc::clone(&ble),
            }),
            Some(ConfigStore::new(dir.path().join("settings.json"))),
        );
        let coordinator = Arc::new(PrintCoordinator::new(transports, ReceiptBuilder::new()));

        Self {
            coordinator,
            usb,
            ble,
            dir,
        }
    }

    pub fn settings_path(&self) -> std::path::PathBuf {
        self.dir.path().join("settings.json")
    }
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
