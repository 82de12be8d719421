//! Vote ledger access
//!
//! The ledger is an append-only store of cast votes, written by the external
//! vote-casting collaborator. The core only reads it through the paginated
//! `fetch_uncounted` query; consumed records are deleted inside the
//! aggregation transaction, never here.
//!
//! The trait seam exists so the scheduler and stats reader can run against
//! an in-memory ledger in tests.

use async_trait::async_trait;
use bson::{doc, Document};

use crate::db::schemas::VoteRecord;
use crate::db::MongoCollection;
use crate::types::{EntryKind, Result};

/// Optional scope for ledger queries and drains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteFilter {
    pub entry_kind: Option<EntryKind>,
    pub thread_id: Option<String>,
    pub entry_id: Option<String>,
}

impl VoteFilter {
    /// Match every uncounted vote
    pub fn all() -> Self {
        Self::default()
    }

    /// Scope to one entry kind
    pub fn by_kind(entry_kind: EntryKind) -> Self {
        Self {
            entry_kind: Some(entry_kind),
            ..Default::default()
        }
    }

    /// Scope to a thread
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Scope to a single entry
    pub fn with_entry(mut self, entry_id: impl Into<String>) -> Self {
        self.entry_id = Some(entry_id.into());
        self
    }

    /// Convert to a MongoDB filter document
    pub fn to_filter(&self) -> Document {
        let mut filter = doc! {};

        if let Some(kind) = self.entry_kind {
            filter.insert("entry_kind", kind.as_str());
        }

        if let Some(ref thread_id) = self.thread_id {
            filter.insert("thread_id", thread_id);
        }

        if let Some(ref entry_id) = self.entry_id {
            filter.insert("entry_id", entry_id);
        }

        filter
    }
}

/// One page of uncounted votes
///
/// Absence of `next_bookmark` means the caller has reached the end of the
/// matching set as of query time.
#[derive(Debug, Clone)]
pub struct UncountedPage {
    pub items: Vec<VoteRecord>,
    pub next_bookmark: Option<String>,
}

impl UncountedPage {
    /// An exhausted page
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_bookmark: None,
        }
    }
}

/// Paginated read access to the vote ledger
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Fetch up to `limit` uncounted votes matching `filter`, starting after
    /// `bookmark` in vote-id order (newest cast first).
    async fn fetch_uncounted(
        &self,
        filter: &VoteFilter,
        bookmark: Option<&str>,
        limit: u32,
    ) -> Result<UncountedPage>;
}

/// MongoDB-backed vote ledger
pub struct MongoVoteLedger {
    votes: MongoCollection<VoteRecord>,
}

impl MongoVoteLedger {
    pub fn new(votes: MongoCollection<VoteRecord>) -> Self {
        Self { votes }
    }
}

#[async_trait]
impl VoteLedger for MongoVoteLedger {
    async fn fetch_uncounted(
        &self,
        filter: &VoteFilter,
        bookmark: Option<&str>,
        limit: u32,
    ) -> Result<UncountedPage> {
        let mut query = filter.to_filter();
        if let Some(mark) = bookmark {
            query.insert("_id", doc! { "$gt": mark });
        }

        let items = self
            .votes
            .find_page(query, doc! { "_id": 1 }, limit as i64)
            .await?;

        // A short page is the last page; a full page may have more behind it
        let next_bookmark = if items.len() as u32 == limit {
            items.last().map(|vote| vote.vote_id.clone())
        } else {
            None
        };

        Ok(UncountedPage {
            items,
            next_bookmark,
        })
    }
}
