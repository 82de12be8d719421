//! Status endpoint
//!
//! Service-level status for operators: version, node identity, MongoDB
//! connectivity and the scheduler snapshot.

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::json_response;
use crate::aggregation::SchedulerStatus;
use crate::server::AppState;

/// Status response payload
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Service name
    pub service: &'static str,
    /// Service version
    pub version: &'static str,
    /// Node ID
    pub node_id: String,
    /// MongoDB connection status
    pub mongodb_connected: bool,
    /// Aggregation scheduler state
    pub scheduler: SchedulerStatus,
}

/// Handle status request
pub async fn status_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongodb_connected = state
        .mongo
        .inner()
        .database(state.mongo.db_name())
        .run_command(doc! { "ping": 1 })
        .await
        .is_ok();

    let status = StatusResponse {
        service: "tallyhouse",
        version: env!("CARGO_PKG_VERSION"),
        node_id: state.args.node_id.to_string(),
        mongodb_connected,
        scheduler: state.scheduler.status().await,
    };

    json_response(StatusCode::OK, &status)
}
