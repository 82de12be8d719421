//! Aggregation operator endpoints
//!
//! Manual drain, enabled flag, timer lifecycle, scheduler status and
//! backlog stats. These endpoints are the fixed operator contract over the
//! scheduler; they hold no aggregation logic of their own.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::{error_response, json_response};
use crate::ledger::VoteFilter;
use crate::server::AppState;
use crate::types::{EntryKind, Result, TallyError};

/// Optional entry scope from a query string
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub entry_kind: Option<String>,
    pub thread_id: Option<String>,
    pub entry_id: Option<String>,
}

impl FilterQuery {
    /// Parse from a raw query string, treating absence as "match all"
    pub fn parse(query: Option<&str>) -> Result<Self> {
        match query {
            None | Some("") => Ok(Self::default()),
            Some(q) => serde_urlencoded::from_str(q)
                .map_err(|e| TallyError::BadRequest(format!("Invalid query string: {}", e))),
        }
    }

    /// Convert to a ledger filter
    pub fn to_vote_filter(&self) -> Result<VoteFilter> {
        let entry_kind = self
            .entry_kind
            .as_deref()
            .map(EntryKind::parse)
            .transpose()?;

        Ok(VoteFilter {
            entry_kind,
            thread_id: self.thread_id.clone(),
            entry_id: self.entry_id.clone(),
        })
    }
}

/// PUT /aggregation/enabled body
#[derive(Debug, Deserialize)]
struct EnabledBody {
    enabled: bool,
}

/// POST /aggregation/drain - drain every matching uncounted vote now
pub async fn handle_drain(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    let filter = match FilterQuery::parse(query).and_then(|q| q.to_vote_filter()) {
        Ok(filter) => filter,
        Err(e) => return error_response(e),
    };

    match state.scheduler.drain_all(filter).await {
        Ok(report) => json_response(StatusCode::OK, &report),
        Err(e) => error_response(e),
    }
}

/// GET /aggregation/status - scheduler snapshot
pub async fn handle_scheduler_status(state: Arc<AppState>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.scheduler.status().await)
}

/// GET /aggregation/enabled
pub fn handle_enabled_get(state: Arc<AppState>) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "enabled": state.scheduler.is_enabled() }),
    )
}

/// PUT /aggregation/enabled - toggle interval-triggered runs
pub fn handle_enabled_put(state: Arc<AppState>, body: &[u8]) -> Response<Full<Bytes>> {
    match serde_json::from_slice::<EnabledBody>(body) {
        Ok(req) => {
            state.scheduler.set_enabled(req.enabled);
            json_response(
                StatusCode::OK,
                &serde_json::json!({ "enabled": req.enabled }),
            )
        }
        Err(e) => error_response(TallyError::BadRequest(format!("Invalid body: {}", e))),
    }
}

/// POST /aggregation/timer/start
pub async fn handle_timer_start(state: Arc<AppState>) -> Response<Full<Bytes>> {
    Arc::clone(&state.scheduler).start().await;
    json_response(StatusCode::OK, &state.scheduler.status().await)
}

/// POST /aggregation/timer/stop
pub async fn handle_timer_stop(state: Arc<AppState>) -> Response<Full<Bytes>> {
    state.scheduler.stop().await;
    json_response(StatusCode::OK, &state.scheduler.status().await)
}

/// GET /aggregation/backlog - sampled uncounted-vote stats
pub async fn handle_backlog(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    let filter = match FilterQuery::parse(query).and_then(|q| q.to_vote_filter()) {
        Ok(filter) => filter,
        Err(e) => return error_response(e),
    };

    match state.stats.backlog(&filter).await {
        Ok(stats) => json_response(StatusCode::OK, &stats),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_absent_matches_all() {
        let filter = FilterQuery::parse(None).unwrap().to_vote_filter().unwrap();
        assert_eq!(filter, VoteFilter::all());
    }

    #[test]
    fn test_filter_query_parses_scope() {
        let filter = FilterQuery::parse(Some("entryKind=submission&threadId=t-1&entryId=s-2"))
            .unwrap()
            .to_vote_filter()
            .unwrap();
        assert_eq!(filter.entry_kind, Some(EntryKind::Submission));
        assert_eq!(filter.thread_id.as_deref(), Some("t-1"));
        assert_eq!(filter.entry_id.as_deref(), Some("s-2"));
    }

    #[test]
    fn test_filter_query_rejects_unknown_kind() {
        let query = FilterQuery::parse(Some("entryKind=comment")).unwrap();
        assert!(query.to_vote_filter().is_err());
    }

    #[test]
    fn test_enabled_body_parses() {
        let body: EnabledBody = serde_json::from_slice(br#"{"enabled":false}"#).unwrap();
        assert!(!body.enabled);
        assert!(serde_json::from_slice::<EnabledBody>(b"{}").is_err());
    }
}
