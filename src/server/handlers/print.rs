//! Print and status handlers.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{error_response, print_error_response, task_error_response};
use crate::server::state::AppState;

/// `url` and `code`, from a form body or the query string.
#[derive(Debug, Default, Deserialize)]
pub struct PrintParams {
    pub url: Option<String>,
    pub code: Option<String>,
}

fn pick(form: Option<String>, query: Option<String>) -> Option<String> {
    form.filter(|s| !s.trim().is_empty())
        .or(query.filter(|s| !s.trim().is_empty()))
}

/// Handle POST /print/thermal - print a download receipt on the active printer.
pub async fn thermal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PrintParams>,
    form: Option<Form<PrintParams>>,
) -> Response {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let (Some(url), Some(code)) = (pick(form.url, query.url), pick(form.code, query.code)) else {
        return error_response(StatusCode::BAD_REQUEST, "'url' and 'code' are required");
    };

    // USB and BLE sends block for up to the transport timeouts
    let coordinator = state.coordinator.clone();
    let result = tokio::task::spawn_blocking(move || coordinator.print(&url, &code)).await;

    match result {
        Ok(Ok(receipt)) => Json(json!({
            "ok": true,
            "status": "success",
            "message": format!("{} thermal print job sent successfully", receipt.mode),
            "mode": receipt.mode,
            "printer": receipt.printer,
            "job_id": receipt.job_id,
            "bytes": receipt.bytes,
            "partial": receipt.partial,
            "printed_at": receipt.printed_at,
        }))
        .into_response(),
        Ok(Err(e)) => print_error_response(&e),
        Err(e) => task_error_response(e),
    }
}

/// Handle GET /status.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.coordinator.status();
    Json(json!({
        "status": "ready",
        "thermal_mode": status.mode,
        "ble_state": status.ble_state,
        "selection": {
            "usb": status.usb_printer,
            "ble": status.ble,
        },
    }))
}
