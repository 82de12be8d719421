//! Voter receipt schema
//!
//! Audit trail: one write-once document per consumed vote, keyed by
//! `(voter_id, vote_id)` so a vote can never produce two receipts. Receipts
//! are never mutated or deleted.

use bson::{doc, DateTime, Document};
use mongodb::options::IndexOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for voter receipts
pub const VOTER_RECEIPTS: &str = "voter_receipts";

/// Audit record for one aggregated vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterReceipt {
    /// Document id, format `{voter_id}:{vote_id}`
    #[serde(rename = "_id")]
    pub id: String,

    pub voter_id: String,

    /// The vote this receipt documents
    pub vote_id: String,

    pub magnitude: Decimal,

    /// When the vote was folded into its tally
    pub recorded_at: DateTime,
}

impl VoterReceipt {
    pub fn new(voter_id: impl Into<String>, vote_id: impl Into<String>, magnitude: Decimal) -> Self {
        let voter_id = voter_id.into();
        let vote_id = vote_id.into();
        Self {
            id: Self::receipt_key(&voter_id, &vote_id),
            voter_id,
            vote_id,
            magnitude,
            recorded_at: DateTime::now(),
        }
    }

    /// Storage key for a `(voter, vote)` pair
    pub fn receipt_key(voter_id: &str, vote_id: &str) -> String {
        format!("{}:{}", voter_id, vote_id)
    }
}

impl IntoIndexes for VoterReceipt {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Per-voter audit reads
            (doc! { "voter_id": 1 }, None),
        ]
    }
}
