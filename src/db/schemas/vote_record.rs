//! Vote record schema
//!
//! One document per cast vote. Records are created by the external
//! vote-casting collaborator and are ephemeral: the aggregation transaction
//! deletes each record in the same atomic commit that folds it into the
//! entry's tally, so a vote can never be counted twice.

use bson::{doc, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::IntoIndexes;
use crate::rank;
use crate::types::{EntryKind, EntryRef};

/// Collection name for vote records
pub const VOTE_RECORDS: &str = "vote_records";

/// One cast vote, pending aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Vote id, also the document `_id`. Inverse-time-lexicographic:
    /// newest votes sort first.
    #[serde(rename = "_id")]
    pub vote_id: String,

    /// Class of entry the vote targets
    pub entry_kind: EntryKind,

    /// Thread the entry lives under
    pub thread_id: String,

    /// Composite identity of the voted-on entry
    pub entry_id: String,

    /// Who cast the vote
    pub voter_id: String,

    /// Burned token quantity (non-negative)
    pub magnitude: Decimal,

    /// When the vote was cast
    pub cast_at: DateTime,
}

impl VoteRecord {
    /// Create a record for a vote cast now
    pub fn new(entry: EntryRef, voter_id: impl Into<String>, magnitude: Decimal) -> Self {
        let cast_at = Utc::now();
        Self {
            vote_id: Self::vote_id_at(cast_at.timestamp_millis()),
            entry_kind: entry.entry_kind,
            thread_id: entry.thread_id,
            entry_id: entry.entry_id,
            voter_id: voter_id.into(),
            magnitude,
            cast_at: DateTime::from_chrono(cast_at),
        }
    }

    /// Derive a vote id from a cast time (milliseconds since epoch)
    ///
    /// The inverse-time prefix gives newest-first lexicographic order; the
    /// random suffix keeps ids unique when votes land in the same
    /// millisecond.
    pub fn vote_id_at(cast_millis: i64) -> String {
        format!(
            "{}-{}",
            rank::inverse_time_key(cast_millis),
            Uuid::new_v4().simple()
        )
    }

    /// The entry this vote targets
    pub fn entry_ref(&self) -> EntryRef {
        EntryRef::new(self.entry_kind, self.thread_id.clone(), self.entry_id.clone())
    }
}

impl IntoIndexes for VoteRecord {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Filtered backlog queries scope by entry
            (doc! { "entry_kind": 1, "thread_id": 1, "entry_id": 1 }, None),
            // Per-voter lookups (replay checks by the casting collaborator)
            (doc! { "voter_id": 1 }, None),
        ]
    }
}
