//! Document schemas for the aggregation collections

pub mod entry_tally;
pub mod rank_entry;
pub mod vote_record;
pub mod voter_receipt;

pub use entry_tally::{EntryTally, ENTRY_TALLIES};
pub use rank_entry::{RankEntry, RANK_ENTRIES};
pub use vote_record::{VoteRecord, VOTE_RECORDS};
pub use voter_receipt::{VoterReceipt, VOTER_RECEIPTS};
