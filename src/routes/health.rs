//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the service running?)
//! - /ready, /readyz - readiness (can it reach MongoDB?)

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::json_response;
use crate::server::AppState;

/// Health response payload
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall health status (true if the service is running)
    pub healthy: bool,
    /// 'online' or 'degraded'
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Node identifier
    pub node_id: String,
    /// Current timestamp
    pub timestamp: String,
    /// Aggregation pipeline snapshot
    pub aggregation: AggregationHealth,
}

/// Aggregation state in the health payload
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationHealth {
    pub enabled: bool,
    pub busy: bool,
    pub timer_running: bool,
}

async fn build_health_response(state: &AppState, mongo_ok: bool) -> HealthResponse {
    let scheduler = state.scheduler.status().await;

    HealthResponse {
        healthy: true,
        status: if mongo_ok { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        node_id: state.args.node_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        aggregation: AggregationHealth {
            enabled: scheduler.enabled,
            busy: scheduler.busy,
            timer_running: scheduler.running,
        },
    }
}

/// Check MongoDB reachability
async fn mongo_reachable(state: &AppState) -> bool {
    state
        .mongo
        .inner()
        .database(state.mongo.db_name())
        .run_command(doc! { "ping": 1 })
        .await
        .is_ok()
}

/// Handle liveness probe (/health, /healthz)
///
/// Returns 200 OK whenever the service is running; MongoDB state is
/// informational only.
pub async fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo_ok = mongo_reachable(&state).await;
    let response = build_health_response(&state, mongo_ok).await;
    json_response(StatusCode::OK, &response)
}

/// Handle readiness probe (/ready, /readyz)
///
/// Returns 200 only when MongoDB is reachable; without it neither
/// aggregation nor the read paths can serve.
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo_ok = mongo_reachable(&state).await;
    let response = build_health_response(&state, mongo_ok).await;

    let status = if mongo_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(status, &response)
}
