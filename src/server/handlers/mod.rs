//! HTTP handlers for the server.

pub mod devices;
pub mod print;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{ErrorKind, PrintError};

/// `{ok: false, message}` with the given status.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "ok": false, "message": message.into() }))).into_response()
}

/// Map a coordinator error: bad input is 400, everything else 500.
fn print_error_response(e: &PrintError) -> Response {
    let status = match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

fn task_error_response(e: tokio::task::JoinError) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Task error: {}", e),
    )
}
