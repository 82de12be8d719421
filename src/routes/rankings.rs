//! Ranking read endpoint
//!
//! GET /rankings/{entryKind}/{threadId}?limit=N, the top-N read the rank
//! index exists to serve. An ascending index walk; no sort at read time.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{error_response, json_response};
use crate::aggregation::RankedEntry;
use crate::server::AppState;
use crate::types::{EntryKind, TallyError};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

/// Ranking response payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsResponse {
    pub entry_kind: EntryKind,
    pub thread_id: String,
    pub entries: Vec<RankedEntry>,
}

/// Handle a rankings request for `/rankings/{entryKind}/{threadId}`
pub async fn handle_rankings(
    state: Arc<AppState>,
    path: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let rest = path.trim_start_matches("/rankings/");
    let (kind_segment, thread_id) = match rest.split_once('/') {
        Some((kind, thread)) if !kind.is_empty() && !thread.is_empty() => (kind, thread),
        _ => {
            return error_response(TallyError::BadRequest(
                "Expected /rankings/{entryKind}/{threadId}".to_string(),
            ))
        }
    };

    let entry_kind = match EntryKind::parse(kind_segment) {
        Ok(kind) => kind,
        Err(e) => return error_response(e),
    };

    let limit = query
        .and_then(|q| serde_urlencoded::from_str::<LimitQuery>(q).ok())
        .and_then(|q| q.limit)
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    match state.stats.top_entries(entry_kind, thread_id, limit).await {
        Ok(entries) => json_response(
            StatusCode::OK,
            &RankingsResponse {
                entry_kind,
                thread_id: thread_id.to_string(),
                entries,
            },
        ),
        Err(e) => error_response(e),
    }
}
