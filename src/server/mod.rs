//! # HTTP Server
//!
//! Accepts print jobs from the booth software and exposes the device controls.
//!
//! ## Usage
//!
//! ```bash
//! thermal-bridge serve --listen 0.0.0.0:2462
//! curl -X POST 'http://localhost:2462/print/thermal' -d url=https://x.test/a -d code=ABC123
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/print/thermal` | print a download receipt (`url`, `code`) |
//! | GET | `/status` | mode, selection, BLE connection state |
//! | GET | `/api/usb/printers` | rescan USB printers |
//! | POST | `/api/usb/select` | select USB printer by index |
//! | POST | `/api/ble/scan` | scan BLE devices |
//! | POST | `/api/ble/select` | select BLE device by index and detect UUIDs |
//! | POST | `/api/ble/detect` | re-run UUID detection |
//! | PUT | `/api/ble/uuids` | set service/characteristic UUIDs manually |
//! | POST | `/api/ble/disconnect` | drop the BLE link |
//! | PUT | `/api/mode` | switch between USB and BLE |

mod handlers;
mod state;

pub use state::{AppState, DEFAULT_LISTEN_ADDR, ServerConfig};

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::coordinator::PrintCoordinator;
use crate::error::BridgeError;

/// Build the router. Exposed so tests can drive it without a socket.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/print/thermal", post(handlers::print::thermal))
        .route("/status", get(handlers::print::status))
        .route("/api/usb/printers", get(handlers::devices::usb_printers))
        .route("/api/usb/select", post(handlers::devices::usb_select))
        .route("/api/ble/scan", post(handlers::devices::ble_scan))
        .route("/api/ble/select", post(handlers::devices::ble_select))
        .route("/api/ble/detect", post(handlers::devices::ble_detect))
        .route("/api/ble/uuids", put(handlers::devices::ble_uuids))
        .route("/api/ble/disconnect", post(handlers::devices::ble_disconnect))
        .route("/api/mode", put(handlers::devices::set_mode))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// ```no_run
/// use std::sync::Arc;
/// use thermal_bridge::server::{serve, ServerConfig};
/// # use thermal_bridge::coordinator::PrintCoordinator;
///
/// # async fn example(coordinator: Arc<PrintCoordinator>) -> Result<(), thermal_bridge::BridgeError> {
/// serve(ServerConfig::default(), coordinator, async {
///     let _ = tokio::signal::ctrl_c().await;
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(
    config: ServerConfig,
    coordinator: Arc<PrintCoordinator>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BridgeError> {
    let listen_addr = config.listen_addr.clone();
    let app = router(Arc::new(AppState::new(config, coordinator)));

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| BridgeError::Server(format!("Failed to bind to {}: {}", listen_addr, e)))?;
    info!("Thermal bridge listening on http://{}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| BridgeError::Server(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
