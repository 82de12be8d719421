//! Aggregation scheduler
//!
//! Drives the aggregation transaction over the whole vote ledger in bounded
//! pages. A single interval timer triggers runs; a busy flag guarantees at
//! most one run is in flight process-wide, and manual drains share the same
//! guard; a second caller gets an "already in progress" error rather than
//! being queued.
//!
//! Interval-driven runs are capped at `max_pages_per_run` pages so a large
//! backlog cannot monopolize the timer; the pagination cursor is saved
//! between ticks and the next tick resumes where the cap stopped. A failed
//! page ends the run and clears the cursor: the failed transaction deleted
//! nothing, so the next tick safely re-reads the same votes from a fresh
//! query. Manual drains have no page cap and run to exhaustion or error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregation::transaction::{CountVotes, VoteBatch};
use crate::ledger::{VoteFilter, VoteLedger};
use crate::types::{Result, TallyError};

/// Scheduler configuration knobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between aggregation runs (milliseconds)
    pub interval_ms: u64,
    /// Votes fetched per ledger page
    pub batch_size: u32,
    /// Page cap for one interval-driven run
    pub max_pages_per_run: u32,
    /// Whether interval-triggered runs are enabled at startup
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            batch_size: 100,
            max_pages_per_run: 10,
            enabled: true,
        }
    }
}

/// Snapshot of scheduler state for the operator surface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    /// Interval-triggered runs enabled
    pub enabled: bool,
    /// Interval timer task alive
    pub running: bool,
    /// A run is in flight right now
    pub busy: bool,
    pub interval_ms: u64,
    pub batch_size: u32,
    pub max_pages_per_run: u32,
}

/// Outcome of a manual drain
///
/// A drain that fails after its first page reports the progress already
/// committed instead of raising; earlier pages cannot be un-counted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub success: bool,
    pub total_processed: usize,
    pub pages_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Single-flight guard over the busy flag
///
/// Released on drop, so the flag clears on every exit path.
struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl RunGuard {
    fn try_acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| Self {
                busy: Arc::clone(busy),
            })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Background poller that drives vote aggregation
///
/// Constructed once per process and injected into the operator surface; all
/// lifecycle state lives on the object, not in module globals.
pub struct AggregationScheduler {
    config: SchedulerConfig,
    ledger: Arc<dyn VoteLedger>,
    counter: Arc<dyn CountVotes>,
    enabled: AtomicBool,
    busy: Arc<AtomicBool>,
    /// Interval cursor carried across ticks when the page cap stops a run
    cursor: Mutex<Option<String>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AggregationScheduler {
    pub fn new(
        config: SchedulerConfig,
        ledger: Arc<dyn VoteLedger>,
        counter: Arc<dyn CountVotes>,
    ) -> Self {
        let enabled = config.enabled;
        Self {
            config,
            ledger,
            counter,
            enabled: AtomicBool::new(enabled),
            busy: Arc::new(AtomicBool::new(false)),
            cursor: Mutex::new(None),
            timer: Mutex::new(None),
        }
    }

    /// Start the interval timer. No-op if already running.
    ///
    /// The first tick fires immediately, which is the run-once-at-startup
    /// trigger; the enabled flag still gates it.
    pub async fn start(self: Arc<Self>) {
        let mut timer = self.timer.lock().await;
        if timer.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            debug!("Aggregation timer already running");
            return;
        }

        let scheduler = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(scheduler.config.interval_ms));
            // A run longer than the interval must not cause a tick burst
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.run_interval_tick().await;
            }
        });
        *timer = Some(handle);

        info!(
            interval_ms = self.config.interval_ms,
            batch_size = self.config.batch_size,
            max_pages_per_run = self.config.max_pages_per_run,
            "Aggregation timer started"
        );
    }

    /// Stop the interval timer. An in-flight page is not interrupted; the
    /// busy flag clears when the current run's guard drops.
    pub async fn stop(&self) {
        let mut timer = self.timer.lock().await;
        if let Some(handle) = timer.take() {
            handle.abort();
            info!("Aggregation timer stopped");
        }
    }

    /// Enable or disable interval-triggered runs without touching the timer.
    /// Re-enabling takes effect on the next tick.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Aggregation enabled flag updated");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current scheduler state
    pub async fn status(&self) -> SchedulerStatus {
        let running = self
            .timer
            .lock()
            .await
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);

        SchedulerStatus {
            enabled: self.is_enabled(),
            running,
            busy: self.is_busy(),
            interval_ms: self.config.interval_ms,
            batch_size: self.config.batch_size,
            max_pages_per_run: self.config.max_pages_per_run,
        }
    }

    /// One interval-driven run: up to `max_pages_per_run` pages from the
    /// saved cursor. Errors are logged, never raised; the next tick retries
    /// from a fresh query.
    async fn run_interval_tick(&self) {
        if !self.enabled.load(Ordering::SeqCst) {
            debug!("Aggregation disabled; skipping tick");
            return;
        }

        let Some(_guard) = RunGuard::try_acquire(&self.busy) else {
            info!("Aggregation run already in progress; skipping tick");
            return;
        };

        let filter = VoteFilter::all();
        let mut bookmark = self.cursor.lock().await.take();
        let mut pages = 0u32;
        let mut processed = 0usize;

        while pages < self.config.max_pages_per_run {
            let page = match self
                .ledger
                .fetch_uncounted(&filter, bookmark.as_deref(), self.config.batch_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(pages, "Ledger query failed, ending run: {}", e);
                    return;
                }
            };

            if page.items.is_empty() {
                break;
            }

            let vote_ids: Vec<String> =
                page.items.iter().map(|v| v.vote_id.clone()).collect();

            match self.counter.count_votes(VoteBatch::new(vote_ids)).await {
                Ok(outcome) => {
                    processed += outcome.votes_counted;
                    pages += 1;
                }
                Err(e) => {
                    // The failed batch deleted nothing; a fresh query next
                    // tick re-reads the same votes.
                    warn!(pages, "Aggregation transaction failed, ending run: {}", e);
                    return;
                }
            }

            match page.next_bookmark {
                Some(mark) => bookmark = Some(mark),
                None => {
                    bookmark = None;
                    break;
                }
            }
        }

        if pages == self.config.max_pages_per_run && bookmark.is_some() {
            // Page cap hit with work remaining: the next tick resumes here
            *self.cursor.lock().await = bookmark;
            info!(votes = processed, pages, "Page cap reached; cursor saved for next tick");
        } else if processed > 0 {
            info!(votes = processed, pages, "Aggregation run complete, backlog drained");
        } else {
            debug!("Aggregation run complete, no uncounted votes");
        }
    }

    /// Drain every uncounted vote matching `filter`, with no page cap.
    ///
    /// Rejected with a conflict error if any run is already in flight. A
    /// failure on the very first page propagates; a failure on a later page
    /// stops the drain and reports the progress already committed.
    pub async fn drain_all(&self, filter: VoteFilter) -> Result<DrainReport> {
        let Some(_guard) = RunGuard::try_acquire(&self.busy) else {
            return Err(TallyError::Conflict(
                "aggregation already in progress".to_string(),
            ));
        };

        info!(
            entry_kind = ?filter.entry_kind,
            thread_id = ?filter.thread_id,
            entry_id = ?filter.entry_id,
            "Manual drain started"
        );

        let mut bookmark: Option<String> = None;
        let mut total_processed = 0usize;
        let mut pages_processed = 0usize;

        loop {
            let step: Result<Option<(usize, Option<String>)>> = async {
                let page = self
                    .ledger
                    .fetch_uncounted(&filter, bookmark.as_deref(), self.config.batch_size)
                    .await?;

                if page.items.is_empty() {
                    return Ok(None);
                }

                let vote_ids: Vec<String> =
                    page.items.iter().map(|v| v.vote_id.clone()).collect();
                let batch = VoteBatch::with_hints(
                    vote_ids,
                    filter.thread_id.clone(),
                    filter.entry_id.clone(),
                );
                let outcome = self.counter.count_votes(batch).await?;

                Ok(Some((outcome.votes_counted, page.next_bookmark)))
            }
            .await;

            match step {
                Ok(None) => break,
                Ok(Some((counted, next_bookmark))) => {
                    total_processed += counted;
                    pages_processed += 1;
                    match next_bookmark {
                        Some(mark) => bookmark = Some(mark),
                        None => break,
                    }
                }
                Err(e) if pages_processed == 0 => {
                    warn!("Manual drain failed on first page: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        votes = total_processed,
                        pages = pages_processed,
                        "Manual drain stopped early: {}",
                        e
                    );
                    return Ok(DrainReport {
                        success: false,
                        total_processed,
                        pages_processed,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            votes = total_processed,
            pages = pages_processed,
            "Manual drain complete"
        );

        Ok(DrainReport {
            success: true,
            total_processed,
            pages_processed,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::transaction::{validate_batch, BatchOutcome};
    use crate::db::schemas::VoteRecord;
    use crate::ledger::UncountedPage;
    use crate::rank;
    use crate::types::{EntryKind, EntryRef};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    /// Shared in-memory store mirroring the ledger's delete-on-success
    /// semantics: the counter removes votes it folds, so a page is never
    /// served twice.
    #[derive(Default)]
    struct MemoryState {
        votes: Vec<VoteRecord>,
        tallies: HashMap<String, Decimal>,
        ranks: HashMap<String, String>,
        receipts: Vec<String>,
    }

    struct MemoryLedger {
        state: Arc<StdMutex<MemoryState>>,
    }

    #[async_trait]
    impl VoteLedger for MemoryLedger {
        async fn fetch_uncounted(
            &self,
            filter: &VoteFilter,
            bookmark: Option<&str>,
            limit: u32,
        ) -> Result<UncountedPage> {
            let state = self.state.lock().unwrap();
            let mut matching: Vec<VoteRecord> = state
                .votes
                .iter()
                .filter(|v| filter.entry_kind.map_or(true, |k| v.entry_kind == k))
                .filter(|v| filter.thread_id.as_ref().map_or(true, |t| &v.thread_id == t))
                .filter(|v| filter.entry_id.as_ref().map_or(true, |e| &v.entry_id == e))
                .filter(|v| bookmark.map_or(true, |mark| v.vote_id.as_str() > mark))
                .cloned()
                .collect();
            matching.sort_by(|a, b| a.vote_id.cmp(&b.vote_id));
            matching.truncate(limit as usize);

            let next_bookmark = if matching.len() as u32 == limit {
                matching.last().map(|v| v.vote_id.clone())
            } else {
                None
            };
            Ok(UncountedPage {
                items: matching,
                next_bookmark,
            })
        }
    }

    /// In-memory counter: all-or-nothing like the real transaction, with an
    /// optional injected failure on the nth call.
    struct MemoryCounter {
        state: Arc<StdMutex<MemoryState>>,
        fail_on_call: Option<usize>,
        calls: AtomicUsize,
    }

    impl MemoryCounter {
        fn new(state: Arc<StdMutex<MemoryState>>) -> Self {
            Self {
                state,
                fail_on_call: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_on(state: Arc<StdMutex<MemoryState>>, call: usize) -> Self {
            Self {
                state,
                fail_on_call: Some(call),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CountVotes for MemoryCounter {
        async fn count_votes(&self, batch: VoteBatch) -> Result<BatchOutcome> {
            validate_batch(&batch.vote_ids)?;

            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(TallyError::Database("injected failure".to_string()));
            }

            let mut state = self.state.lock().unwrap();

            // All-or-nothing: resolve every vote before mutating anything
            let mut votes = Vec::with_capacity(batch.vote_ids.len());
            for vote_id in &batch.vote_ids {
                let vote = state
                    .votes
                    .iter()
                    .find(|v| &v.vote_id == vote_id)
                    .cloned()
                    .ok_or_else(|| TallyError::NotFound(format!("Vote {}", vote_id)))?;
                votes.push(vote);
            }

            let mut entries = std::collections::HashSet::new();
            for vote in votes {
                let key = vote.entry_ref().tally_key();
                let total = state.tallies.entry(key.clone()).or_insert(Decimal::ZERO);
                *total += vote.magnitude;
                let new_total = *total;
                state
                    .ranks
                    .insert(key.clone(), rank::rank_key(new_total, &vote.vote_id));
                state.receipts.push(format!("{}:{}", vote.voter_id, vote.vote_id));
                state.votes.retain(|v| v.vote_id != vote.vote_id);
                entries.insert(key);
            }

            Ok(BatchOutcome {
                votes_counted: batch.vote_ids.len(),
                entries_touched: entries.len(),
            })
        }
    }

    fn vote(entry: &EntryRef, magnitude: &str, millis: i64) -> VoteRecord {
        VoteRecord {
            vote_id: VoteRecord::vote_id_at(millis),
            entry_kind: entry.entry_kind,
            thread_id: entry.thread_id.clone(),
            entry_id: entry.entry_id.clone(),
            voter_id: format!("voter-{}", millis),
            magnitude: Decimal::from_str(magnitude).unwrap(),
            cast_at: bson::DateTime::from_millis(millis),
        }
    }

    fn scheduler_with(
        config: SchedulerConfig,
        state: &Arc<StdMutex<MemoryState>>,
        counter: MemoryCounter,
    ) -> Arc<AggregationScheduler> {
        Arc::new(AggregationScheduler::new(
            config,
            Arc::new(MemoryLedger {
                state: Arc::clone(state),
            }),
            Arc::new(counter),
        ))
    }

    fn seed(state: &Arc<StdMutex<MemoryState>>, votes: Vec<VoteRecord>) {
        state.lock().unwrap().votes = votes;
    }

    #[tokio::test]
    async fn test_interval_tick_drains_backlog() {
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(
            &state,
            (0..5).map(|i| vote(&entry, "10", 1_000 + i)).collect(),
        );

        let config = SchedulerConfig {
            batch_size: 2,
            ..Default::default()
        };
        let scheduler = scheduler_with(config, &state, MemoryCounter::new(Arc::clone(&state)));
        scheduler.run_interval_tick().await;

        let state = state.lock().unwrap();
        assert!(state.votes.is_empty());
        assert_eq!(
            state.tallies.get(&entry.tally_key()),
            Some(&Decimal::from_str("50").unwrap())
        );
        assert_eq!(state.receipts.len(), 5);
    }

    #[tokio::test]
    async fn test_conservation_independent_of_batching() {
        let entry = EntryRef::new(EntryKind::Submission, "t-1", "s-1");
        for batch_size in [1u32, 3, 100] {
            let state = Arc::new(StdMutex::new(MemoryState::default()));
            seed(
                &state,
                vec![
                    vote(&entry, "100", 1_000),
                    vote(&entry, "200", 2_000),
                    vote(&entry, "50", 3_000),
                ],
            );
            let config = SchedulerConfig {
                batch_size,
                ..Default::default()
            };
            let scheduler =
                scheduler_with(config, &state, MemoryCounter::new(Arc::clone(&state)));
            scheduler.run_interval_tick().await;

            let state = state.lock().unwrap();
            assert_eq!(
                state.tallies.get(&entry.tally_key()),
                Some(&Decimal::from_str("350").unwrap()),
                "batch_size {}",
                batch_size
            );
        }
    }

    #[tokio::test]
    async fn test_rerun_over_drained_ledger_is_noop() {
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(&state, vec![vote(&entry, "100", 1_000)]);

        let scheduler = scheduler_with(
            SchedulerConfig::default(),
            &state,
            MemoryCounter::new(Arc::clone(&state)),
        );
        scheduler.run_interval_tick().await;
        scheduler.run_interval_tick().await;

        let state = state.lock().unwrap();
        assert_eq!(state.receipts.len(), 1);
        assert_eq!(
            state.tallies.get(&entry.tally_key()),
            Some(&Decimal::from_str("100").unwrap())
        );
    }

    #[tokio::test]
    async fn test_page_cap_saves_cursor_and_resumes() {
        // 5 pages of backlog, cap of 2: the first tick stops after page 2,
        // the next tick resumes from the saved cursor
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(
            &state,
            (0..10).map(|i| vote(&entry, "1", 1_000 + i)).collect(),
        );

        let config = SchedulerConfig {
            batch_size: 2,
            max_pages_per_run: 2,
            ..Default::default()
        };
        let scheduler = scheduler_with(config, &state, MemoryCounter::new(Arc::clone(&state)));

        scheduler.run_interval_tick().await;
        assert_eq!(state.lock().unwrap().votes.len(), 6);
        assert!(scheduler.cursor.lock().await.is_some());

        scheduler.run_interval_tick().await;
        assert_eq!(state.lock().unwrap().votes.len(), 2);

        scheduler.run_interval_tick().await;
        assert!(state.lock().unwrap().votes.is_empty());
        assert!(scheduler.cursor.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_run_clears_cursor_and_retries_fresh() {
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(
            &state,
            (0..4).map(|i| vote(&entry, "5", 1_000 + i)).collect(),
        );

        let config = SchedulerConfig {
            batch_size: 2,
            max_pages_per_run: 1,
            ..Default::default()
        };
        // Second transaction fails
        let scheduler = scheduler_with(
            config,
            &state,
            MemoryCounter::failing_on(Arc::clone(&state), 2),
        );

        scheduler.run_interval_tick().await;
        assert_eq!(state.lock().unwrap().votes.len(), 2);
        assert!(scheduler.cursor.lock().await.is_some());

        // Failing tick: nothing consumed, cursor cleared
        scheduler.run_interval_tick().await;
        assert_eq!(state.lock().unwrap().votes.len(), 2);
        assert!(scheduler.cursor.lock().await.is_none());

        // Next tick retries from a fresh query and drains the rest
        scheduler.run_interval_tick().await;
        assert!(state.lock().unwrap().votes.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_skips_ticks() {
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(&state, vec![vote(&entry, "100", 1_000)]);

        let config = SchedulerConfig {
            enabled: false,
            ..Default::default()
        };
        let scheduler = scheduler_with(config, &state, MemoryCounter::new(Arc::clone(&state)));
        scheduler.run_interval_tick().await;
        assert_eq!(state.lock().unwrap().votes.len(), 1);

        // Re-enabling takes effect on the next tick
        scheduler.set_enabled(true);
        scheduler.run_interval_tick().await;
        assert!(state.lock().unwrap().votes.is_empty());
    }

    #[tokio::test]
    async fn test_manual_drain_has_no_page_cap() {
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(
            &state,
            (0..6).map(|i| vote(&entry, "1", 1_000 + i)).collect(),
        );

        let config = SchedulerConfig {
            batch_size: 2,
            max_pages_per_run: 1,
            ..Default::default()
        };
        let scheduler = scheduler_with(config, &state, MemoryCounter::new(Arc::clone(&state)));

        let report = scheduler.drain_all(VoteFilter::all()).await.unwrap();
        assert!(report.success);
        assert_eq!(report.total_processed, 6);
        assert_eq!(report.pages_processed, 3);
        assert!(state.lock().unwrap().votes.is_empty());
    }

    #[tokio::test]
    async fn test_drain_rejected_while_run_active() {
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        let scheduler = scheduler_with(
            SchedulerConfig::default(),
            &state,
            MemoryCounter::new(Arc::clone(&state)),
        );

        let _held = RunGuard::try_acquire(&scheduler.busy).unwrap();
        let err = scheduler.drain_all(VoteFilter::all()).await.unwrap_err();
        assert!(matches!(err, TallyError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_drain_first_page_failure_propagates() {
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(&state, vec![vote(&entry, "1", 1_000)]);

        let scheduler = scheduler_with(
            SchedulerConfig::default(),
            &state,
            MemoryCounter::failing_on(Arc::clone(&state), 1),
        );

        let err = scheduler.drain_all(VoteFilter::all()).await.unwrap_err();
        assert!(matches!(err, TallyError::Database(_)));
        // Busy flag released by the guard
        assert!(!scheduler.is_busy());
    }

    #[tokio::test]
    async fn test_drain_later_page_failure_reports_partial_progress() {
        let entry = EntryRef::new(EntryKind::Thread, "t-1", "t-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(
            &state,
            (0..6).map(|i| vote(&entry, "1", 1_000 + i)).collect(),
        );

        let config = SchedulerConfig {
            batch_size: 2,
            ..Default::default()
        };
        let scheduler = scheduler_with(
            config,
            &state,
            MemoryCounter::failing_on(Arc::clone(&state), 2),
        );

        let report = scheduler.drain_all(VoteFilter::all()).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.total_processed, 2);
        assert_eq!(report.pages_processed, 1);
        assert!(report.error.is_some());
        // The first page's votes stay consumed
        assert_eq!(state.lock().unwrap().votes.len(), 4);
    }

    #[tokio::test]
    async fn test_drain_with_filter_leaves_other_threads_alone() {
        let target = EntryRef::new(EntryKind::Submission, "t-1", "s-1");
        let other = EntryRef::new(EntryKind::Submission, "t-2", "s-2");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(
            &state,
            vec![
                vote(&target, "10", 1_000),
                vote(&other, "20", 2_000),
                vote(&target, "30", 3_000),
            ],
        );

        let scheduler = scheduler_with(
            SchedulerConfig::default(),
            &state,
            MemoryCounter::new(Arc::clone(&state)),
        );

        let filter = VoteFilter::by_kind(EntryKind::Submission).with_thread("t-1");
        let report = scheduler.drain_all(filter).await.unwrap();
        assert_eq!(report.total_processed, 2);

        let state = state.lock().unwrap();
        assert_eq!(state.votes.len(), 1);
        assert_eq!(state.votes[0].thread_id, "t-2");
    }

    #[tokio::test]
    async fn test_two_batch_scenario_keeps_single_rank_entry() {
        // Votes of 100, 200 and 50 aggregated in two batches leave a total
        // of 350, one live rank key and three receipts
        let entry = EntryRef::new(EntryKind::Submission, "t-1", "s-1");
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        seed(
            &state,
            vec![
                vote(&entry, "100", 1_000),
                vote(&entry, "200", 2_000),
                vote(&entry, "50", 3_000),
            ],
        );

        let config = SchedulerConfig {
            batch_size: 2,
            ..Default::default()
        };
        let scheduler = scheduler_with(config, &state, MemoryCounter::new(Arc::clone(&state)));
        let report = scheduler.drain_all(VoteFilter::all()).await.unwrap();
        assert_eq!(report.pages_processed, 2);

        let state = state.lock().unwrap();
        assert!(state.votes.is_empty());
        assert_eq!(
            state.tallies.get(&entry.tally_key()),
            Some(&Decimal::from_str("350").unwrap())
        );
        assert_eq!(state.ranks.len(), 1);
        let rank_key = state.ranks.get(&entry.tally_key()).unwrap();
        assert!(rank_key.starts_with(&rank::encode_magnitude(Decimal::from_str("350").unwrap())));
        assert_eq!(state.receipts.len(), 3);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let state = Arc::new(StdMutex::new(MemoryState::default()));
        let scheduler = scheduler_with(
            SchedulerConfig::default(),
            &state,
            MemoryCounter::new(Arc::clone(&state)),
        );

        let status = scheduler.status().await;
        assert!(status.enabled);
        assert!(!status.running);
        assert!(!status.busy);
        assert_eq!(status.batch_size, 100);

        Arc::clone(&scheduler).start().await;
        assert!(scheduler.status().await.running);
        scheduler.stop().await;
        assert!(!scheduler.status().await.running);
    }
}
