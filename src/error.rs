//! # Error Types
//!
//! Every layer has its own `thiserror` enum; each exposes [`ErrorKind`] so
//! callers can decide what to do without matching on message strings.
//!
//! | Kind | Meaning | HTTP |
//! |------|---------|------|
//! | Validation | missing/invalid request input | 400 |
//! | DeviceNotSelected | no printer configured for the active mode | 500 |
//! | Discovery | scan or characteristic detection found nothing | 500 |
//! | Connection | link could not be opened | 500 |
//! | Transfer | bytes failed to reach the printer | 500 |
//! | ProtocolBuild | a receipt section could not be rendered | (logged only) |

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::printer::ThermalMode;

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    DeviceNotSelected,
    Discovery,
    Connection,
    Transfer,
    ProtocolBuild,
}

/// Bluetooth LE transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BleError {
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    #[error("BLE scan failed: {0}")]
    Scan(String),

    #[error("BLE connection timed out after {}s", .0.as_secs_f32())]
    ConnectTimeout(Duration),

    #[error("BLE connection failed: {0}")]
    ConnectFailed(String),

    #[error("BLE service discovery failed: {0}")]
    ServiceDiscovery(String),

    /// No characteristic advertises write or write-without-response.
    #[error("No writable BLE characteristic found")]
    NotFound,

    #[error("Invalid BLE UUID: {0}")]
    InvalidUuid(String),

    #[error("BLE write failed: {0}")]
    WriteFailed(String),

    #[error("BLE send timed out after {}s", .0.as_secs_f32())]
    SendTimeout(Duration),

    #[error("BLE runtime unavailable: {0}")]
    Runtime(String),
}

impl BleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BleError::InvalidUuid(_) => ErrorKind::Validation,
            BleError::Scan(_) | BleError::ServiceDiscovery(_) | BleError::NotFound => {
                ErrorKind::Discovery
            }
            BleError::NoAdapter
            | BleError::ConnectTimeout(_)
            | BleError::ConnectFailed(_)
            | BleError::Runtime(_) => ErrorKind::Connection,
            BleError::WriteFailed(_) | BleError::SendTimeout(_) => ErrorKind::Transfer,
        }
    }
}

/// USB transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    #[error("Operation not supported on this platform")]
    NotSupported,

    #[error("USB resource busy")]
    Busy,

    #[error("USB transfer timed out")]
    Timeout,

    #[error("USB access denied (check udev rules / permissions)")]
    Access,

    #[error("USB device disconnected")]
    NoDevice,

    #[error("No OUT endpoint on printer interface")]
    NoEndpoint,

    #[error("USB write failed: {0}")]
    WriteFailed(String),

    #[error("USB error: {0}")]
    Other(String),
}

impl UsbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UsbError::Timeout | UsbError::WriteFailed(_) => ErrorKind::Transfer,
            _ => ErrorKind::Connection,
        }
    }
}

impl From<rusb::Error> for UsbError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::NotSupported => UsbError::NotSupported,
            rusb::Error::Busy => UsbError::Busy,
            rusb::Error::Timeout => UsbError::Timeout,
            rusb::Error::Access => UsbError::Access,
            rusb::Error::NoDevice => UsbError::NoDevice,
            other => UsbError::Other(other.to_string()),
        }
    }
}

/// Errors surfaced by the print coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    #[error("'url' and 'code' are required ('{0}' is missing)")]
    MissingField(&'static str),

    #[error("No {0} thermal printer selected")]
    NoDeviceSelected(ThermalMode),

    #[error("BLE Service/Characteristic UUID not set")]
    MissingCharacteristic,

    #[error(transparent)]
    Ble(#[from] BleError),

    #[error(transparent)]
    Usb(#[from] UsbError),
}

impl PrintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrintError::MissingField(_) => ErrorKind::Validation,
            PrintError::NoDeviceSelected(_) | PrintError::MissingCharacteristic => {
                ErrorKind::DeviceNotSelected
            }
            PrintError::Ble(e) => e.kind(),
            PrintError::Usb(e) => e.kind(),
        }
    }
}

/// Persisted configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error for the binary and HTTP server.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Server error: {0}")]
    Server(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Print(#[from] PrintError),

    #[error(transparent)]
    Ble(#[from] BleError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
