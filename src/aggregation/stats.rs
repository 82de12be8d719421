//! Backlog and ranking reads
//!
//! Pure read paths: a sampled view of the uncounted backlog (one bounded
//! page fetch, never a full scan) and the top-N walk of the rank index. No
//! write paths live here.

use std::collections::HashMap;
use std::sync::Arc;

use bson::doc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::schemas::{RankEntry, VoteRecord};
use crate::db::MongoCollection;
use crate::ledger::{VoteFilter, VoteLedger};
use crate::types::{EntryKind, Result};

/// Pending votes for one entry within the sampled page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogSample {
    pub entry_kind: EntryKind,
    pub thread_id: String,
    pub entry_id: String,
    pub pending_votes: usize,
    pub pending_magnitude: Decimal,
}

/// Bounded view of the uncounted backlog
///
/// `uncounted_count` is the size of the sampled page; `has_more` reports
/// whether votes exist beyond it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogStats {
    pub uncounted_count: usize,
    pub has_more: bool,
    pub sample_entries: Vec<BacklogSample>,
}

/// One position in a ranking read
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub entry_id: String,
    pub total_magnitude: Decimal,
    pub rank_key: String,
}

/// Group a sampled page per entry, preserving first-seen order
fn group_samples(items: &[VoteRecord]) -> Vec<BacklogSample> {
    let mut order: Vec<String> = Vec::new();
    let mut samples: HashMap<String, BacklogSample> = HashMap::new();

    for vote in items {
        let key = vote.entry_ref().tally_key();
        let sample = samples.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            BacklogSample {
                entry_kind: vote.entry_kind,
                thread_id: vote.thread_id.clone(),
                entry_id: vote.entry_id.clone(),
                pending_votes: 0,
                pending_magnitude: Decimal::ZERO,
            }
        });
        sample.pending_votes += 1;
        sample.pending_magnitude += vote.magnitude;
    }

    order
        .into_iter()
        .filter_map(|key| samples.remove(&key))
        .collect()
}

/// Read-only introspection over the backlog and the rank index
pub struct StatsReader {
    ledger: Arc<dyn VoteLedger>,
    ranks: MongoCollection<RankEntry>,
    sample_size: u32,
}

impl StatsReader {
    pub fn new(
        ledger: Arc<dyn VoteLedger>,
        ranks: MongoCollection<RankEntry>,
        sample_size: u32,
    ) -> Self {
        Self {
            ledger,
            ranks,
            sample_size,
        }
    }

    /// Sample the uncounted backlog for a filter
    pub async fn backlog(&self, filter: &VoteFilter) -> Result<BacklogStats> {
        let page = self
            .ledger
            .fetch_uncounted(filter, None, self.sample_size)
            .await?;

        Ok(BacklogStats {
            uncounted_count: page.items.len(),
            has_more: page.next_bookmark.is_some(),
            sample_entries: group_samples(&page.items),
        })
    }

    /// Top entries for a `(kind, thread)` scope
    ///
    /// Ascending walk of the rank index; no sort happens at read time.
    pub async fn top_entries(
        &self,
        entry_kind: EntryKind,
        thread_id: &str,
        limit: i64,
    ) -> Result<Vec<RankedEntry>> {
        let filter = doc! {
            "entry_kind": entry_kind.as_str(),
            "thread_id": thread_id,
        };

        let rows = self
            .ranks
            .find_page(filter, doc! { "rank_key": 1 }, limit)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RankedEntry {
                entry_id: row.entry_id,
                total_magnitude: row.total_magnitude,
                rank_key: row.rank_key,
            })
            .collect())
    }
}
