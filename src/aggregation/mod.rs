//! Vote aggregation pipeline
//!
//! - **Transaction**: the atomic fold of a vote batch into tallies, rank
//!   entries and receipts
//! - **Scheduler**: the interval-driven poller that drives the transaction
//!   over the whole ledger in bounded pages
//! - **Stats**: read-only backlog and ranking introspection

pub mod scheduler;
pub mod stats;
pub mod transaction;

pub use scheduler::{AggregationScheduler, DrainReport, SchedulerConfig, SchedulerStatus};
pub use stats::{BacklogSample, BacklogStats, RankedEntry, StatsReader};
pub use transaction::{BatchOutcome, CountVotes, VoteBatch, VoteCounter, MAX_BATCH_VOTES};
