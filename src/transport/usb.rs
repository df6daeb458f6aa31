//! # USB Transport
//!
//! Writes ESC/POS bytes to the bulk OUT endpoint of a USB printer's first
//! interface.
//!
//! ## Send Sequence
//!
//! 1. Open the device
//! 2. Detach the kernel driver (`usblp` on Linux) if one is bound
//! 3. Set the active configuration
//! 4. Locate the OUT endpoint on interface 0
//! 5. Claim the interface, write in [`CHUNK_SIZE`] pieces
//! 6. Release the interface, always
//!
//! Steps 2 and 3 are best effort: platforms without kernel drivers report
//! `NotSupported`, and a device already configured reports `Busy`.
//!
//! A chunk that times out ends the job as a partial delivery rather than an
//! error: some of the receipt has already printed and retrying would print it
//! twice.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::UsbError;

/// Bytes per bulk transfer.
pub const CHUNK_SIZE: usize = 8192;

/// Per-chunk write timeout.
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(5);

/// Printer class interface.
pub const PRINTER_INTERFACE: u8 = 0;

/// Shared handle to an enumerated device.
pub type UsbHandle = Arc<dyn UsbDevice>;

/// String descriptors; any may be unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbStrings {
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
}

/// Enumerates attached devices.
pub trait UsbBus: Send + Sync {
    fn devices(&self) -> Result<Vec<UsbHandle>, UsbError>;
}

/// An enumerated (not yet opened) device.
pub trait UsbDevice: fmt::Debug + Send + Sync {
    /// `(vendor_id, product_id)` from the device descriptor.
    fn ids(&self) -> Result<(u16, u16), UsbError>;

    fn strings(&self) -> Result<UsbStrings, UsbError>;

    fn open(&self) -> Result<Box<dyn UsbLink>, UsbError>;
}

/// An opened device.
pub trait UsbLink: Send {
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError>;

    fn set_active_configuration(&mut self) -> Result<(), UsbError>;

    /// Address of the first bulk OUT endpoint on `interface`.
    fn out_endpoint(&mut self, interface: u8) -> Result<Option<u8>, UsbError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError>;

    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration)
    -> Result<usize, UsbError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError>;
}

/// A USB printer found by a scan.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredPrinter {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
    #[serde(skip)]
    pub handle: UsbHandle,
}

impl DiscoveredPrinter {
    /// `Manufacturer Product (0xVVVV:0xPPPP)`, falling back to
    /// `Unknown`/`Printer` for unreadable strings.
    pub fn display_name(&self) -> String {
        format!(
            "{} {} (0x{:04X}:0x{:04X})",
            self.manufacturer.as_deref().unwrap_or("Unknown"),
            self.product.as_deref().unwrap_or("Printer"),
            self.vendor_id,
            self.product_id
        )
    }

    pub fn serial_or_na(&self) -> &str {
        self.serial.as_deref().unwrap_or("N/A")
    }

    /// Same physical device as the given persisted identity.
    pub fn matches(&self, vendor_id: u16, product_id: u16, serial: Option<&str>) -> bool {
        self.vendor_id == vendor_id
            && self.product_id == product_id
            && self.serial.as_deref().unwrap_or("") == serial.unwrap_or("")
    }
}

/// Outcome of a USB job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsbDelivery {
    pub bytes_written: usize,
    pub total: usize,
}

impl UsbDelivery {
    pub fn is_partial(&self) -> bool {
        self.bytes_written < self.total
    }
}

/// Chunked bulk writer.
#[derive(Debug, Clone, Copy)]
pub struct UsbTransport {
    chunk_size: usize,
    chunk_timeout: Duration,
}

impl Default for UsbTransport {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunk_timeout: CHUNK_TIMEOUT,
        }
    }
}

impl UsbTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `data` to `printer`. The interface is released on every path
    /// once the device has been opened.
    pub fn send(&self, printer: &DiscoveredPrinter, data: &[u8]) -> Result<UsbDelivery, UsbError> {
        info!(bytes = data.len(), "Sending to USB printer {}", printer.display_name());
        let mut link = printer.handle.open()?;
        let result = self.deliver(link.as_mut(), data);
        if let Err(e) = link.release_interface(PRINTER_INTERFACE) {
            debug!("release_interface: {}", e);
        }
        result
    }

    fn deliver(&self, link: &mut dyn UsbLink, data: &[u8]) -> Result<UsbDelivery, UsbError> {
        match link.detach_kernel_driver(PRINTER_INTERFACE) {
            Ok(()) | Err(UsbError::NotSupported) => {}
            Err(e) => warn!("Could not detach kernel driver: {}", e),
        }
        match link.set_active_configuration() {
            Ok(()) | Err(UsbError::Busy) => {}
            Err(e) => warn!("Could not set configuration: {}", e),
        }

        let endpoint = link
            .out_endpoint(PRINTER_INTERFACE)?
            .ok_or(UsbError::NoEndpoint)?;
        link.claim_interface(PRINTER_INTERFACE)?;

        let mut written = 0;
        for chunk in data.chunks(self.chunk_size) {
            match link.write_bulk(endpoint, chunk, self.chunk_timeout) {
                Ok(n) => written += n,
                Err(UsbError::Timeout) => {
                    warn!(
                        written,
                        total = data.len(),
                        "USB write timed out, job partially printed"
                    );
                    break;
                }
                Err(e) => return Err(UsbError::WriteFailed(e.to_string())),
            }
        }

        Ok(UsbDelivery {
            bytes_written: written,
            total: data.len(),
        })
    }
}

/// libusb-backed bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct RusbBus;

impl UsbBus for RusbBus {
    fn devices(&self) -> Result<Vec<UsbHandle>, UsbError> {
        let list = rusb::devices()?;
        Ok(list
            .iter()
            .map(|device| Arc::new(RusbDevice { device }) as UsbHandle)
            .collect())
    }
}

#[derive(Debug)]
struct RusbDevice {
    device: rusb::Device<rusb::GlobalContext>,
}

impl UsbDevice for RusbDevice {
    fn ids(&self) -> Result<(u16, u16), UsbError> {
        let desc = self.device.device_descriptor()?;
        Ok((desc.vendor_id(), desc.product_id()))
    }

    fn strings(&self) -> Result<UsbStrings, UsbError> {
        let desc = self.device.device_descriptor()?;
        let handle = self.device.open()?;
        Ok(UsbStrings {
            manufacturer: handle.read_manufacturer_string_ascii(&desc).ok(),
            product: handle.read_product_string_ascii(&desc).ok(),
            serial: handle.read_serial_number_string_ascii(&desc).ok(),
        })
    }

    fn open(&self) -> Result<Box<dyn UsbLink>, UsbError> {
        let handle = self.device.open()?;
        Ok(Box::new(RusbLink {
            device: self.device.clone(),
            handle,
        }))
    }
}

struct RusbLink {
    device: rusb::Device<rusb::GlobalContext>,
    handle: rusb::DeviceHandle<rusb::GlobalContext>,
}

impl UsbLink for RusbLink {
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        if self.handle.kernel_driver_active(interface)? {
            self.handle.detach_kernel_driver(interface)?;
        }
        Ok(())
    }

    fn set_active_configuration(&mut self) -> Result<(), UsbError> {
        let config = self.device.config_descriptor(0)?;
        self.handle.set_active_configuration(config.number())?;
        Ok(())
    }

    fn out_endpoint(&mut self, interface: u8) -> Result<Option<u8>, UsbError> {
        let config = match self.device.active_config_descriptor() {
            Ok(c) => c,
            Err(_) => self.device.config_descriptor(0)?,
        };
        for iface in config.interfaces().filter(|i| i.number() == interface) {
            for setting in iface.descriptors().filter(|d| d.setting_number() == 0) {
                if let Some(ep) = setting.endpoint_descriptors().find(|ep| {
                    ep.direction() == rusb::Direction::Out
                        && ep.transfer_type() == rusb::TransferType::Bulk
                }) {
                    return Ok(Some(ep.address()));
                }
            }
        }
        Ok(None)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        Ok(self.handle.claim_interface(interface)?)
    }

    fn write_bulk(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        Ok(self.handle.write_bulk(endpoint, data, timeout)?)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        Ok(self.handle.release_interface(interface)?)
    }
}
