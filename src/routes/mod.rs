//! HTTP routes for the operator surface

pub mod aggregation;
pub mod health;
pub mod rankings;
pub mod status;

pub use aggregation::{
    handle_backlog, handle_drain, handle_enabled_get, handle_enabled_put,
    handle_scheduler_status, handle_timer_start, handle_timer_stop,
};
pub use health::{health_check, readiness_check};
pub use rankings::handle_rankings;
pub use status::status_check;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::TallyError;

/// Build a JSON response
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(body) {
        Ok(json) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(json)))
            .unwrap_or_else(|_| fallback_response()),
        Err(_) => fallback_response(),
    }
}

/// Build an error response from a TallyError
pub(crate) fn error_response(err: TallyError) -> Response<Full<Bytes>> {
    let (status, message) = err.into_status_code_and_body();
    json_response(status, &serde_json::json!({ "error": message }))
}

/// 404 for unmatched paths
pub fn not_found(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": format!("No route for {}", path) }),
    )
}

fn fallback_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Full::new(Bytes::from_static(b"Failed to build response")))
        .unwrap()
}
