//! Server state and configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::PrintCoordinator;
use crate::transport::ble::DEFAULT_SCAN_TIMEOUT;

/// Default listen address; port 2462 is what existing clients post to.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2462";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:2462")
    pub listen_addr: String,
    /// Scan duration used when a request does not give one
    pub ble_scan_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            ble_scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub coordinator: Arc<PrintCoordinator>,
}

impl AppState {
    pub fn new(config: ServerConfig, coordinator: Arc<PrintCoordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }
}
