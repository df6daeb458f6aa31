//! Device discovery and selection handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::{print_error_response, task_error_response};
use crate::printer::ThermalMode;
use crate::server::state::AppState;

/// Longest scan a request may ask for.
const MAX_SCAN_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct IndexBody {
    /// Position in the last scan; negative or out of range clears.
    pub index: i64,
}

impl IndexBody {
    fn position(&self) -> usize {
        usize::try_from(self.index).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanBody {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UuidBody {
    pub service_uuid: String,
    pub char_uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct ModeBody {
    pub mode: ThermalMode,
}

/// Handle GET /api/usb/printers - rescan and list USB printers.
pub async fn usb_printers(State(state): State<Arc<AppState>>) -> Response {
    let coordinator = state.coordinator.clone();
    match tokio::task::spawn_blocking(move || coordinator.scan_usb()).await {
        Ok(printers) => {
            let list: Vec<_> = printers
                .iter()
                .enumerate()
                .map(|(index, p)| {
                    json!({
                        "index": index,
                        "name": p.display_name(),
                        "vendor_id": format!("0x{:04X}", p.vendor_id),
                        "product_id": format!("0x{:04X}", p.product_id),
                        "manufacturer": p.manufacturer,
                        "product": p.product,
                        "serial": p.serial,
                    })
                })
                .collect();
            Json(json!({ "ok": true, "printers": list })).into_response()
        }
        Err(e) => task_error_response(e),
    }
}

/// Handle POST /api/usb/select.
pub async fn usb_select(State(state): State<Arc<AppState>>, Json(body): Json<IndexBody>) -> Response {
    let coordinator = state.coordinator.clone();
    let index = body.position();
    match tokio::task::spawn_blocking(move || coordinator.select_usb(index)).await {
        Ok(Some(printer)) => Json(json!({
            "ok": true,
            "message": format!("Selected {}", printer.display_name()),
            "printer": printer,
        }))
        .into_response(),
        Ok(None) => Json(json!({ "ok": true, "message": "USB selection cleared" })).into_response(),
        Err(e) => task_error_response(e),
    }
}

/// Handle POST /api/ble/scan.
pub async fn ble_scan(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ScanBody>>,
) -> Response {
    let timeout = body
        .and_then(|Json(b)| b.timeout_secs)
        .map(|s| Duration::from_secs(s.clamp(1, MAX_SCAN_SECS)))
        .unwrap_or(state.config.ble_scan_timeout);

    let coordinator = state.coordinator.clone();
    match tokio::task::spawn_blocking(move || coordinator.scan_ble(timeout)).await {
        Ok(devices) => {
            let list: Vec<_> = devices
                .iter()
                .enumerate()
                .map(|(index, d)| {
                    json!({
                        "index": index,
                        "name": d.name,
                        "address": d.address,
                        "label": d.display_name(),
                    })
                })
                .collect();
            Json(json!({ "ok": true, "devices": list })).into_response()
        }
        Err(e) => task_error_response(e),
    }
}

/// Handle POST /api/ble/select - select, connect and detect UUIDs.
pub async fn ble_select(State(state): State<Arc<AppState>>, Json(body): Json<IndexBody>) -> Response {
    let coordinator = state.coordinator.clone();
    let index = body.position();
    match tokio::task::spawn_blocking(move || coordinator.select_ble(index)).await {
        Ok(selection) => {
            let message = match (&selection.address, &selection.char_uuid) {
                (None, _) => "BLE selection cleared",
                (Some(_), None) => "BLE device selected; enter UUIDs manually",
                (Some(_), Some(_)) => "BLE device selected",
            };
            Json(json!({ "ok": true, "message": message, "ble": selection })).into_response()
        }
        Err(e) => task_error_response(e),
    }
}

/// Handle POST /api/ble/detect.
pub async fn ble_detect(State(state): State<Arc<AppState>>) -> Response {
    let coordinator = state.coordinator.clone();
    match tokio::task::spawn_blocking(move || coordinator.detect_characteristics()).await {
        Ok(Ok((service, characteristic))) => Json(json!({
            "ok": true,
            "service_uuid": service,
            "char_uuid": characteristic,
        }))
        .into_response(),
        Ok(Err(e)) => print_error_response(&e),
        Err(e) => task_error_response(e),
    }
}

/// Handle PUT /api/ble/uuids - manual override.
pub async fn ble_uuids(State(state): State<Arc<AppState>>, Json(body): Json<UuidBody>) -> Response {
    let coordinator = state.coordinator.clone();
    let saved = tokio::task::spawn_blocking(move || {
        coordinator.set_ble_uuids(&body.service_uuid, &body.char_uuid)
    })
    .await;
    match saved {
        Ok(Ok(())) => Json(json!({ "ok": true, "message": "BLE UUIDs saved" })).into_response(),
        Ok(Err(e)) => print_error_response(&e),
        Err(e) => task_error_response(e),
    }
}

/// Handle POST /api/ble/disconnect.
pub async fn ble_disconnect(State(state): State<Arc<AppState>>) -> Response {
    let coordinator = state.coordinator.clone();
    match tokio::task::spawn_blocking(move || coordinator.disconnect_ble()).await {
        Ok(()) => Json(json!({ "ok": true, "message": "BLE disconnected" })).into_response(),
        Err(e) => task_error_response(e),
    }
}

/// Handle PUT /api/mode.
pub async fn set_mode(State(state): State<Arc<AppState>>, Json(body): Json<ModeBody>) -> Response {
    let coordinator = state.coordinator.clone();
    let mode = body.mode;
    match tokio::task::spawn_blocking(move || coordinator.set_mode(mode)).await {
        Ok(()) => Json(json!({ "ok": true, "mode": mode })).into_response(),
        Err(e) => task_error_response(e),
    }
}
