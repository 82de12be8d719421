//! Rank entry schema
//!
//! Secondary index over entry tallies. Rank keys invert magnitude order, so
//! "top N entries in a thread" is an ascending walk of the
//! `(entry_kind, thread_id, rank_key)` index with no sort at read time.
//!
//! A rank key changes whenever the tally total changes, so entries are never
//! updated in place: the aggregation transaction deletes the previous rank
//! entry and inserts a replacement under the new key in the same commit. At
//! most one live rank entry exists per tally at any time.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::types::{EntryKind, EntryRef};

/// Collection name for rank entries
pub const RANK_ENTRIES: &str = "rank_entries";

/// One live ranking position for an entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankEntry {
    /// Document id, format `{kind}:{thread_id}:{rank_key}`
    #[serde(rename = "_id")]
    pub id: String,

    pub entry_kind: EntryKind,
    pub thread_id: String,

    /// Inverse-order key; reflects the entry's current total
    pub rank_key: String,

    /// Total at the time this entry was written
    pub total_magnitude: Decimal,

    pub entry_id: String,
}

impl RankEntry {
    pub fn new(entry: &EntryRef, rank_key: String, total_magnitude: Decimal) -> Self {
        Self {
            id: entry.rank_entry_key(&rank_key),
            entry_kind: entry.entry_kind,
            thread_id: entry.thread_id.clone(),
            rank_key,
            total_magnitude,
            entry_id: entry.entry_id.clone(),
        }
    }
}

impl IntoIndexes for RankEntry {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // The top-N read: ascending rank_key within a (kind, thread) scope
            (doc! { "entry_kind": 1, "thread_id": 1, "rank_key": 1 }, None),
        ]
    }
}
