//! Aggregation transaction: "count votes"
//!
//! The atomic fold. Given a batch of vote ids, each vote is accumulated into
//! its entry's tally, the entry's rank index position is replaced, an audit
//! receipt is written, and the consumed vote record is deleted, all inside
//! one MongoDB session transaction. Either every listed vote is fully folded
//! or readers observe none of the effects; there is no partial-success
//! return.
//!
//! A committed batch leaves no processed vote record behind, which is what
//! makes re-running aggregation over the same page a no-op and gives the
//! pipeline exactly-once counting under at-least-once scheduling.

use std::collections::HashSet;

use async_trait::async_trait;
use bson::doc;
use mongodb::{ClientSession, Collection};
use tracing::{debug, info, warn};

use crate::db::schemas::{EntryTally, RankEntry, VoteRecord, VoterReceipt};
use crate::db::{MongoClient, MongoCollection};
use crate::rank;
use crate::types::{Result, TallyError};

/// Hard cap on vote ids per transaction
pub const MAX_BATCH_VOTES: usize = 1000;

/// Input to one aggregation transaction
#[derive(Debug, Clone)]
pub struct VoteBatch {
    /// Ids of the votes to fold, processed in order
    pub vote_ids: Vec<String>,
    /// Addressing hint for logs; never enforced against the votes
    pub thread_hint: Option<String>,
    /// Addressing hint for logs; never enforced against the votes
    pub entry_hint: Option<String>,
}

impl VoteBatch {
    pub fn new(vote_ids: Vec<String>) -> Self {
        Self {
            vote_ids,
            thread_hint: None,
            entry_hint: None,
        }
    }

    pub fn with_hints(
        vote_ids: Vec<String>,
        thread_hint: Option<String>,
        entry_hint: Option<String>,
    ) -> Self {
        Self {
            vote_ids,
            thread_hint,
            entry_hint,
        }
    }
}

/// Result of a committed batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub votes_counted: usize,
    pub entries_touched: usize,
}

/// Check batch shape before opening a transaction
pub fn validate_batch(vote_ids: &[String]) -> Result<()> {
    if vote_ids.is_empty() {
        return Err(TallyError::Validation("empty vote batch".to_string()));
    }
    if vote_ids.len() > MAX_BATCH_VOTES {
        return Err(TallyError::Validation(format!(
            "batch of {} votes exceeds maximum of {}",
            vote_ids.len(),
            MAX_BATCH_VOTES
        )));
    }
    Ok(())
}

/// The aggregation operation, behind a seam so the scheduler can run against
/// an in-memory double in tests
#[async_trait]
pub trait CountVotes: Send + Sync {
    /// Fold every vote in the batch, all-or-nothing
    async fn count_votes(&self, batch: VoteBatch) -> Result<BatchOutcome>;
}

/// MongoDB-backed vote counter
///
/// Exclusively owns the transition of a vote record into
/// `{tally mutation, rank entry replacement, receipt creation}`; no other
/// component writes those collections.
pub struct VoteCounter {
    mongo: MongoClient,
    votes: Collection<VoteRecord>,
    tallies: Collection<EntryTally>,
    ranks: Collection<RankEntry>,
    receipts: Collection<VoterReceipt>,
}

impl VoteCounter {
    pub fn new(
        mongo: MongoClient,
        votes: &MongoCollection<VoteRecord>,
        tallies: &MongoCollection<EntryTally>,
        ranks: &MongoCollection<RankEntry>,
        receipts: &MongoCollection<VoterReceipt>,
    ) -> Self {
        Self {
            mongo,
            votes: votes.inner().clone(),
            tallies: tallies.inner().clone(),
            ranks: ranks.inner().clone(),
            receipts: receipts.inner().clone(),
        }
    }

    /// Fold every vote in the batch within an open transaction
    async fn fold_batch(
        &self,
        session: &mut ClientSession,
        batch: &VoteBatch,
    ) -> Result<BatchOutcome> {
        let mut entries: HashSet<String> = HashSet::new();

        for vote_id in &batch.vote_ids {
            let tally_key = self.fold_vote(session, vote_id).await?;
            entries.insert(tally_key);
        }

        Ok(BatchOutcome {
            votes_counted: batch.vote_ids.len(),
            entries_touched: entries.len(),
        })
    }

    /// Fold a single vote: accumulate, re-rank, receipt, delete
    async fn fold_vote(&self, session: &mut ClientSession, vote_id: &str) -> Result<String> {
        let vote = self
            .votes
            .find_one(doc! { "_id": vote_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| TallyError::NotFound(format!("Vote {} does not exist", vote_id)))?;

        // Negative magnitudes are rejected at cast time; a tally total must
        // never decrease, so the fold re-checks.
        if vote.magnitude.is_sign_negative() {
            return Err(TallyError::Validation(format!(
                "Vote {} has negative magnitude {}",
                vote_id, vote.magnitude
            )));
        }

        let entry = vote.entry_ref();
        let tally_key = entry.tally_key();

        let mut tally = self
            .tallies
            .find_one(doc! { "_id": &tally_key })
            .session(&mut *session)
            .await?
            .unwrap_or_else(|| EntryTally::new(&entry));

        tally.accumulate(vote.magnitude);

        // The rank key changes with the total, so the previous index entry
        // is removed and a replacement inserted under the new key.
        if let Some(ref old_rank) = tally.rank_ref {
            self.ranks
                .delete_one(doc! { "_id": old_rank })
                .session(&mut *session)
                .await?;
        }

        let rank_key = rank::rank_key(tally.total_magnitude, &vote.vote_id);
        let rank_entry = RankEntry::new(&entry, rank_key, tally.total_magnitude);
        tally.rank_ref = Some(rank_entry.id.clone());

        self.ranks
            .insert_one(&rank_entry)
            .session(&mut *session)
            .await?;

        let receipt = VoterReceipt::new(&vote.voter_id, &vote.vote_id, vote.magnitude);
        self.receipts
            .insert_one(&receipt)
            .session(&mut *session)
            .await?;

        self.tallies
            .replace_one(doc! { "_id": &tally_key }, &tally)
            .upsert(true)
            .session(&mut *session)
            .await?;

        self.votes
            .delete_one(doc! { "_id": vote_id })
            .session(&mut *session)
            .await?;

        debug!(
            vote_id = %vote_id,
            entry = %entry,
            total = %tally.total_magnitude,
            "Vote folded"
        );

        Ok(tally_key)
    }
}

#[async_trait]
impl CountVotes for VoteCounter {
    async fn count_votes(&self, batch: VoteBatch) -> Result<BatchOutcome> {
        validate_batch(&batch.vote_ids)?;

        debug!(
            votes = batch.vote_ids.len(),
            thread_hint = ?batch.thread_hint,
            entry_hint = ?batch.entry_hint,
            "Counting vote batch"
        );

        let mut session = self.mongo.start_session().await?;
        session
            .start_transaction()
            .await
            .map_err(|e| TallyError::Database(format!("Failed to start transaction: {}", e)))?;

        match self.fold_batch(&mut session, &batch).await {
            Ok(outcome) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|e| TallyError::Database(format!("Commit failed: {}", e)))?;

                info!(
                    votes = outcome.votes_counted,
                    entries = outcome.entries_touched,
                    "Vote batch committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!("Failed to abort vote transaction: {}", abort_err);
                }
                Err(e)
            }
        }
    }
}
