//! [`BleBackend`] on top of `btleplug` (BlueZ, CoreBluetooth, WinRT).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ble::{BleBackend, BleLink, CharacteristicInfo, DiscoveredDevice};
use crate::error::BleError;

const UNKNOWN_NAME: &str = "(unknown)";

/// How often to re-check the adapter while waiting for a device to appear.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long a connect waits for an uncached device to show up. Shorter than
/// the connect timeout so the scan is always stopped here.
const DISCOVERY_WAIT: Duration = Duration::from_secs(8);

/// System Bluetooth stack. The adapter is acquired lazily on first use.
#[derive(Default)]
pub struct BtleplugBackend {
    adapter: Option<Adapter>,
}

impl BtleplugBackend {
    pub fn new() -> Self {
        Self::default()
    }

    async fn adapter(&mut self) -> Result<&Adapter, BleError> {
        if self.adapter.is_none() {
            let manager = Manager::new()
                .await
                .map_err(|e| BleError::Runtime(e.to_string()))?;
            let adapter = manager
                .adapters()
                .await
                .map_err(|_| BleError::NoAdapter)?
                .into_iter()
                .next()
                .ok_or(BleError::NoAdapter)?;
            info!("Using Bluetooth adapter");
            self.adapter = Some(adapter);
        }
        self.adapter.as_ref().ok_or(BleError::NoAdapter)
    }

    async fn find(adapter: &Adapter, address: &str) -> Result<Option<Peripheral>, BleError> {
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| BleError::ConnectFailed(e.to_string()))?;
        for p in peripherals {
            if peripheral_address(&p) == address {
                return Ok(Some(p));
            }
        }
        Ok(None)
    }

    async fn wait_for(adapter: &Adapter, address: &str) -> Result<Peripheral, BleError> {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            if let Some(p) = Self::find(adapter, address).await? {
                return Ok(p);
            }
        }
    }
}

/// MAC address where the platform exposes one, otherwise the opaque
/// peripheral id (macOS).
fn peripheral_address(p: &Peripheral) -> String {
    address_or_id(p.address(), p.id())
}

fn address_or_id(addr: BDAddr, id: impl Display) -> String {
    if addr == BDAddr::from([0u8; 6]) {
        id.to_string()
    } else {
        addr.to_string()
    }
}

/// Pass `result` through; on failure run `cleanup` first and log how it went.
async fn cleanup_on_err<T, E: Display>(
    result: Result<T, BleError>,
    cleanup: impl Future<Output = Result<(), E>>,
) -> Result<T, BleError> {
    if result.is_err() {
        match cleanup.await {
            Ok(()) => debug!("BLE link closed after failed setup"),
            Err(e) => warn!("BLE link cleanup failed: {}", e),
        }
    }
    result
}

/// Stops an adapter scan when dropped, including when the surrounding
/// future is cancelled by a timeout.
struct ScanGuard {
    adapter: Option<Adapter>,
}

impl ScanGuard {
    async fn start(adapter: &Adapter) -> Result<Self, btleplug::Error> {
        adapter.start_scan(ScanFilter::default()).await?;
        Ok(Self {
            adapter: Some(adapter.clone()),
        })
    }

    async fn stop(mut self) {
        if let Some(adapter) = self.adapter.take() {
            if let Err(e) = adapter.stop_scan().await {
                debug!("stop_scan: {}", e);
            }
        }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let Some(adapter) = self.adapter.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = adapter.stop_scan().await {
                        debug!("stop_scan: {}", e);
                    }
                });
            }
            Err(_) => warn!("BLE scan left running: no runtime to stop it"),
        }
    }
}

#[async_trait]
impl BleBackend for BtleplugBackend {
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, BleError> {
        let adapter = self.adapter().await?;
        let scan = ScanGuard::start(adapter)
            .await
            .map_err(|e| BleError::Scan(e.to_string()))?;
        tokio::time::sleep(timeout).await;
        let peripherals = adapter.peripherals().await;
        scan.stop().await;
        let peripherals = peripherals.map_err(|e| BleError::Scan(e.to_string()))?;

        let mut devices = Vec::with_capacity(peripherals.len());
        for p in peripherals {
            let name = match p.properties().await {
                Ok(Some(props)) => props.local_name,
                _ => None,
            };
            devices.push(DiscoveredDevice {
                name: name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
                address: peripheral_address(&p),
            });
        }
        info!("Found {} BLE devices", devices.len());
        Ok(devices)
    }

    async fn connect(&mut self, address: &str) -> Result<Box<dyn BleLink>, BleError> {
        let adapter = self.adapter().await?;

        let peripheral = match Self::find(adapter, address).await? {
            Some(p) => p,
            None => {
                // not cached yet; scan until it shows up
                let scan = ScanGuard::start(adapter)
                    .await
                    .map_err(|e| BleError::ConnectFailed(e.to_string()))?;
                let found =
                    tokio::time::timeout(DISCOVERY_WAIT, Self::wait_for(adapter, address)).await;
                scan.stop().await;
                match found {
                    Ok(found) => found?,
                    Err(_) => {
                        return Err(BleError::ConnectFailed(format!(
                            "{} not seen within {:?}",
                            address, DISCOVERY_WAIT
                        )));
                    }
                }
            }
        };

        peripheral
            .connect()
            .await
            .map_err(|e| BleError::ConnectFailed(e.to_string()))?;
        let discovered = peripheral
            .discover_services()
            .await
            .map_err(|e| BleError::ServiceDiscovery(e.to_string()));
        cleanup_on_err(discovered, peripheral.disconnect()).await?;

        Ok(Box::new(BtleplugLink { peripheral }))
    }
}

struct BtleplugLink {
    peripheral: Peripheral,
}

impl BtleplugLink {
    fn characteristic(&self, uuid: Uuid) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
    }
}

#[async_trait]
impl BleLink for BtleplugLink {
    async fn characteristics(&mut self) -> Result<Vec<CharacteristicInfo>, BleError> {
        let mut out = Vec::new();
        for service in self.peripheral.services() {
            for c in &service.characteristics {
                out.push(CharacteristicInfo {
                    service: service.uuid,
                    uuid: c.uuid,
                    write: c.properties.contains(CharPropFlags::WRITE),
                    write_without_response: c
                        .properties
                        .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
                });
            }
        }
        Ok(out)
    }

    async fn write(&mut self, characteristic: Uuid, chunk: &[u8]) -> Result<(), BleError> {
        let c = self.characteristic(characteristic).ok_or_else(|| {
            BleError::WriteFailed(format!("characteristic {} not on device", characteristic))
        })?;
        let write_type = if c.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };
        self.peripheral
            .write(&c, chunk, write_type)
            .await
            .map_err(|e| BleError::WriteFailed(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), BleError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| BleError::ConnectFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_address_prefers_mac() {
        let mac = BDAddr::from([0x66, 0x22, 0xB2, 0x0F, 0x11, 0x9A]);
        assert_eq!(address_or_id(mac, "ignored"), "66:22:B2:0F:11:9A");
    }

    #[test]
    fn test_address_falls_back_to_plain_id() {
        let id = Uuid::parse_str("2f1c4e5a-0b7d-4c1e-9a3f-6d8e2b4c1a70").unwrap();
        assert_eq!(
            address_or_id(BDAddr::from([0u8; 6]), id),
            "2f1c4e5a-0b7d-4c1e-9a3f-6d8e2b4c1a70"
        );
    }

    #[tokio::test]
    async fn test_failed_setup_closes_link() {
        let closed = AtomicUsize::new(0);
        let close = async {
            closed.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        };
        let result: Result<(), BleError> =
            cleanup_on_err(Err(BleError::ServiceDiscovery("GATT timeout".into())), close).await;
        assert_eq!(result, Err(BleError::ServiceDiscovery("GATT timeout".into())));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_setup_keeps_link() {
        let closed = AtomicUsize::new(0);
        let close = async {
            closed.fetch_add(1, Ordering::SeqCst);
            Err::<(), String>("unexpected".into())
        };
        assert_eq!(cleanup_on_err(Ok(7), close).await, Ok(7));
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }
}
