//! Entry tally schema
//!
//! One durable running total per voted-on entry. Created lazily when the
//! first vote for an entry is aggregated, updated in place on every
//! aggregation after that, never deleted.

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::types::{EntryKind, EntryRef};

/// Collection name for entry tallies
pub const ENTRY_TALLIES: &str = "entry_tallies";

/// Durable running vote total for one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryTally {
    /// Document id, format `{kind}:{thread_id}:{entry_id}`
    #[serde(rename = "_id")]
    pub id: String,

    pub entry_kind: EntryKind,
    pub thread_id: String,
    pub entry_id: String,

    /// Sum of every aggregated vote magnitude for this entry.
    /// Monotonically non-decreasing over the entry's lifetime.
    pub total_magnitude: Decimal,

    /// `_id` of the live rank entry; None until the first vote is counted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_ref: Option<String>,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl EntryTally {
    /// Fresh tally with a zero total and no rank reference
    pub fn new(entry: &EntryRef) -> Self {
        let now = DateTime::now();
        Self {
            id: entry.tally_key(),
            entry_kind: entry.entry_kind,
            thread_id: entry.thread_id.clone(),
            entry_id: entry.entry_id.clone(),
            total_magnitude: Decimal::ZERO,
            rank_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold one vote magnitude into the total
    pub fn accumulate(&mut self, magnitude: Decimal) {
        self.total_magnitude += magnitude;
        self.updated_at = DateTime::now();
    }

    /// The entry this tally belongs to
    pub fn entry_ref(&self) -> EntryRef {
        EntryRef::new(self.entry_kind, self.thread_id.clone(), self.entry_id.clone())
    }
}

impl IntoIndexes for EntryTally {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Per-thread tally listings
            (doc! { "entry_kind": 1, "thread_id": 1 }, None),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_new_tally_starts_at_zero() {
        let tally = EntryTally::new(&EntryRef::new(EntryKind::Thread, "t-1", "t-1"));
        assert_eq!(tally.id, "thread:t-1:t-1");
        assert_eq!(tally.total_magnitude, Decimal::ZERO);
        assert!(tally.rank_ref.is_none());
    }

    #[test]
    fn test_accumulate_sums_magnitudes() {
        let mut tally = EntryTally::new(&EntryRef::new(EntryKind::Submission, "t-1", "s-1"));
        tally.accumulate(Decimal::from_str("100").unwrap());
        tally.accumulate(Decimal::from_str("200").unwrap());
        tally.accumulate(Decimal::from_str("50").unwrap());
        assert_eq!(tally.total_magnitude, Decimal::from_str("350").unwrap());
    }
}
