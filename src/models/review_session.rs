//! Review service and multi-round re-drill sessions.
//!
//! `ReviewDesk` is what a UI or batch job talks to: it loads an item from the
//! store, runs the scheduling engine, writes the result back and appends a
//! session log entry. `ReviewSession` walks through the items due now, and
//! items scored below 3 are shown again in later rounds until they pass.

use super::scheduler::{GraduationPolicy, ReviewOutcome, ScoreThreshold, Scheduler};
use super::{PerformanceScore, ReviewItem, ReviewItemId, SessionLogEntry, SubjectPath};
use crate::database::{ReviewStore, SessionRecorder};
use crate::error::{Result, ReviewError};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// The store keeps microseconds; `now` is cut to that before it is used so
/// returned items match what was persisted.
fn storage_time(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(6)
}

/// Serializes every mutation through one lock on the store, so at most one
/// review per item is ever in flight.
pub struct ReviewDesk<S, R, G = ScoreThreshold> {
    store: Arc<Mutex<S>>,
    recorder: Arc<Mutex<R>>,
    scheduler: Scheduler<G>,
}

impl<S, R, G> ReviewDesk<S, R, G>
where
    S: ReviewStore,
    R: SessionRecorder,
    G: GraduationPolicy,
{
    pub fn new(store: S, recorder: R, scheduler: Scheduler<G>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            recorder: Arc::new(Mutex::new(recorder)),
            scheduler,
        }
    }

    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    pub fn recorder(&self) -> Arc<Mutex<R>> {
        Arc::clone(&self.recorder)
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, S>> {
        self.store.lock().map_err(|_| ReviewError::LockPoisoned)
    }

    /// Starts tracking a new mistake, due immediately.
    pub fn log_mistake(&self, subject_path: SubjectPath, now: DateTime<Utc>) -> Result<ReviewItem> {
        let item = ReviewItem::new(subject_path, storage_time(now));
        self.lock_store()?.insert(&item)?;
        tracing::info!(item = %item.id, path = %item.subject_path, "mistake logged");
        Ok(item)
    }

    pub fn get(&self, id: ReviewItemId) -> Result<ReviewItem> {
        self.lock_store()?.get(id)?.ok_or(ReviewError::NotFound(id))
    }

    /// Records one review of `id` and returns the caller-facing outcome.
    pub fn record_review(
        &self,
        id: ReviewItemId,
        score: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        self.record_review_item(id, score, now)
            .map(|item| ReviewOutcome::from(&item))
    }

    /// Like `record_review`, but returns the full updated item.
    ///
    /// The item is always re-read from the store, never taken from a cache,
    /// so a retry after a failed write starts from the persisted state.
    pub fn record_review_item(
        &self,
        id: ReviewItemId,
        score: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewItem> {
        let validated = PerformanceScore::new(score)?;
        let now = storage_time(now);
        let updated = {
            let mut store = self.lock_store()?;
            let item = store.get(id)?.ok_or(ReviewError::NotFound(id))?;
            let updated = self.scheduler.record_review(&item, score, now)?;
            store.put(&updated)?;
            updated
        };

        self.append_log(SessionLogEntry::new(id, validated, now));

        Ok(updated)
    }

    /// A lost log entry never undoes the review it describes.
    fn append_log(&self, entry: SessionLogEntry) {
        match self.recorder.lock() {
            Ok(mut recorder) => {
                if let Err(e) = recorder.append(&entry) {
                    tracing::warn!(item = %entry.review_item_id, "Failed to append session log: {}", e);
                }
            }
            Err(_) => {
                tracing::warn!(item = %entry.review_item_id, "Session recorder lock poisoned");
            }
        }
    }

    /// Explicitly returns a graduated item to active scheduling.
    pub fn reactivate(&self, id: ReviewItemId, now: DateTime<Utc>) -> Result<ReviewItem> {
        let mut store = self.lock_store()?;
        let mut item = store.get(id)?.ok_or(ReviewError::NotFound(id))?;
        item.reactivate(storage_time(now));
        store.put(&item)?;
        tracing::info!(item = %id, "review item reactivated");
        Ok(item)
    }

    /// Active items due at `now`, earliest first.
    pub fn due_today(&self, now: DateTime<Utc>) -> Result<Vec<ReviewItem>> {
        let items = self.lock_store()?.query_due(now)?;
        Ok(super::scheduler::due_today(items, now))
    }

    /// Up to `limit` active items that become due after `now`.
    pub fn upcoming(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReviewItem>> {
        let items = self.lock_store()?.query_upcoming(now, limit)?;
        Ok(super::scheduler::upcoming(items, now, limit))
    }
}

/// One sitting over the items due at its start.
/// Items that aren't passed (score < 3) are repeated in subsequent rounds.
pub struct ReviewSession<'a, S, R, G = ScoreThreshold> {
    desk: &'a ReviewDesk<S, R, G>,
    items: Vec<(ReviewItem, bool)>,
    current_round: Vec<usize>,
    current_index: usize,
    round_number: usize,
}

impl<'a, S, R, G> ReviewSession<'a, S, R, G>
where
    S: ReviewStore,
    R: SessionRecorder,
    G: GraduationPolicy,
{
    /// Creates a session from the items due at `now`.
    pub fn start(desk: &'a ReviewDesk<S, R, G>, now: DateTime<Utc>) -> Result<Self> {
        let items: Vec<_> = desk
            .due_today(now)?
            .into_iter()
            .map(|item| (item, false))
            .collect();
        let indices = (0..items.len()).collect();

        Ok(Self {
            desk,
            items,
            current_round: indices,
            current_index: 0,
            round_number: 1,
        })
    }

    pub fn current_item(&self) -> Option<&ReviewItem> {
        self.current_round
            .get(self.current_index)
            .and_then(|&idx| self.items.get(idx).map(|(item, _)| item))
    }

    /// Grades the current item through the desk and keeps the updated copy.
    pub fn grade_current(&mut self, score: i64, now: DateTime<Utc>) -> Result<ReviewOutcome> {
        let Some(&idx) = self.current_round.get(self.current_index) else {
            return Err(ReviewError::SessionFinished);
        };

        let id = self.items[idx].0.id;
        let updated = self.desk.record_review_item(id, score, now)?;
        let passed = PerformanceScore::new(score)?.is_passing();
        let outcome = ReviewOutcome::from(&updated);
        self.items[idx] = (updated, passed);
        Ok(outcome)
    }

    pub fn next_item(&mut self) {
        if self.current_index + 1 < self.current_round.len() {
            self.current_index += 1;
        } else {
            self.start_next_round();
        }
    }

    /// Starts a new round with the items that weren't passed. Items that
    /// graduated anyway are dropped. If nothing remains the session is done.
    fn start_next_round(&mut self) {
        let failed: Vec<usize> = self
            .current_round
            .iter()
            .copied()
            .filter(|&idx| {
                self.items
                    .get(idx)
                    .map(|(item, passed)| !passed && !item.is_completed)
                    .unwrap_or(false)
            })
            .collect();

        self.current_round = failed;
        self.current_index = 0;
        if !self.current_round.is_empty() {
            self.round_number += 1;
            for &idx in &self.current_round {
                if let Some((_, passed)) = self.items.get_mut(idx) {
                    *passed = false;
                }
            }
        }
    }

    pub fn round_number(&self) -> usize {
        self.round_number
    }

    pub fn passed_count(&self) -> usize {
        self.current_round
            .iter()
            .filter(|&&idx| self.items.get(idx).map(|(_, passed)| *passed).unwrap_or(false))
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.current_round.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.passed_count()
    }

    pub fn is_completed(&self) -> bool {
        self.current_round.is_empty()
    }

    pub fn phase_message(&self) -> String {
        if self.round_number == 1 {
            format!("Round {}: {} items", self.round_number, self.total_count())
        } else {
            format!(
                "Round {} (re-drill): {} items to retry",
                self.round_number,
                self.total_count()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{SqliteSessionLog, SqliteStore, StoreError};
    use crate::error::ScheduleError;
    use crate::models::IntervalStage;
    use crate::models::interval::SubDayMode;
    use chrono::{Duration, TimeZone, Timelike};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 4, 19, 0, 0).unwrap()
    }

    fn desk() -> ReviewDesk<SqliteStore, SqliteSessionLog> {
        ReviewDesk::new(
            SqliteStore::open_in_memory().unwrap(),
            SqliteSessionLog::open_in_memory().unwrap(),
            Scheduler::new(),
        )
    }

    fn path(chapter: &str) -> SubjectPath {
        SubjectPath::new("Biology", "Cell Biology", chapter)
    }

    struct FailingRecorder;

    impl SessionRecorder for FailingRecorder {
        fn append(&mut self, _entry: &SessionLogEntry) -> crate::database::Result<()> {
            Err(StoreError::InvalidRecord("recorder offline".to_string()))
        }
    }

    #[test]
    fn test_record_review_persists_and_logs() {
        let desk = desk();
        let item = desk.log_mistake(path("Ch. 1"), now()).unwrap();

        let outcome = desk.record_review(item.id, 3, now()).unwrap();

        assert_eq!(outcome.new_stage, IntervalStage::Days(1));
        assert_eq!(outcome.next_review_at, now() + Duration::days(1));
        let stored = desk.get(item.id).unwrap();
        assert_eq!(stored.review_count, 1);
        assert_eq!(stored.interval_stage, IntervalStage::Days(1));

        let log = desk.recorder();
        let entries = log.lock().unwrap().entries_for(item.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].performance_score.value(), 3);
    }

    #[test]
    fn test_unknown_item_is_not_found() {
        let desk = desk();
        let missing = ReviewItemId::new();
        assert!(matches!(
            desk.record_review(missing, 4, now()),
            Err(ReviewError::NotFound(id)) if id == missing
        ));
    }

    #[test]
    fn test_invalid_score_leaves_item_untouched() {
        let desk = desk();
        let item = desk.log_mistake(path("Ch. 2"), now()).unwrap();

        let result = desk.record_review(item.id, 7, now());

        assert!(matches!(
            result,
            Err(ReviewError::Schedule(ScheduleError::InvalidScore(7)))
        ));
        assert_eq!(desk.get(item.id).unwrap(), item);
    }

    #[test]
    fn test_graduated_item_rejected_until_reactivated() {
        let desk = desk();
        let item = desk.log_mistake(path("Ch. 3"), now()).unwrap();
        assert!(desk.record_review(item.id, 5, now()).unwrap().is_completed);

        let later = now() + Duration::days(2);
        assert!(matches!(
            desk.record_review(item.id, 5, later),
            Err(ReviewError::Schedule(ScheduleError::AlreadyGraduated(_)))
        ));

        desk.reactivate(item.id, later).unwrap();
        let outcome = desk.record_review(item.id, 1, later).unwrap();
        assert!(!outcome.is_completed);
        assert_eq!(desk.get(item.id).unwrap().review_count, 2);
    }

    #[test]
    fn test_recorder_failure_keeps_review() {
        let desk = ReviewDesk::new(
            SqliteStore::open_in_memory().unwrap(),
            FailingRecorder,
            Scheduler::with_policy(SubDayMode::Immediate, ScoreThreshold(5)),
        );
        let item = desk.log_mistake(path("Ch. 4"), now()).unwrap();

        let outcome = desk.record_review(item.id, 4, now()).unwrap();

        assert!(!outcome.is_completed);
        assert_eq!(desk.get(item.id).unwrap().review_count, 1);
    }

    #[test]
    fn test_queries_sort_store_results() {
        let desk = desk();
        let store = desk.store();
        let mut ids = Vec::new();
        for hours in [3, 1, 2] {
            let mut item = ReviewItem::new(path("Ch. 5"), now());
            item.next_review_at = now() - Duration::hours(hours);
            store.lock().unwrap().insert(&item).unwrap();
            ids.push((hours, item.id));
        }
        let mut future = ReviewItem::new(path("Ch. 6"), now());
        future.next_review_at = now() + Duration::days(3);
        store.lock().unwrap().insert(&future).unwrap();

        let due: Vec<_> = desk.due_today(now()).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(due, vec![ids[0].1, ids[2].1, ids[1].1]);

        let upcoming = desk.upcoming(now(), 5).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, future.id);
    }

    #[test]
    fn test_upcoming_ties_resolved_by_id_before_limit() {
        let desk = desk();
        let store = desk.store();
        let due = now() + Duration::hours(1);
        for raw in [0xff_u128, 0x01] {
            let mut item = ReviewItem::new(path("Ch. 9"), now());
            item.id = ReviewItemId(Uuid::from_u128(raw));
            item.next_review_at = due;
            store.lock().unwrap().insert(&item).unwrap();
        }

        let upcoming = desk.upcoming(now(), 1).unwrap();

        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, ReviewItemId(Uuid::from_u128(0x01)));
    }

    #[test]
    fn test_outcome_matches_stored_item_at_nanosecond_precision() {
        let desk = desk();
        let item = desk.log_mistake(path("Ch. 10"), now()).unwrap();
        let precise = now().with_nanosecond(123_456_789).unwrap();

        let outcome = desk.record_review(item.id, 5, precise).unwrap();
        let stored = desk.get(item.id).unwrap();

        assert_eq!(outcome.next_review_at, stored.next_review_at);
        assert_eq!(outcome, ReviewOutcome::from(&stored));
        assert_eq!(stored.last_reviewed_at.unwrap().nanosecond(), 123_456_000);
    }

    #[test]
    fn test_session_redrills_failed_items() {
        let desk = ReviewDesk::new(
            SqliteStore::open_in_memory().unwrap(),
            SqliteSessionLog::open_in_memory().unwrap(),
            Scheduler::with_policy(SubDayMode::Immediate, ScoreThreshold(5)),
        );
        let first = desk.log_mistake(path("Ch. 7"), now()).unwrap();
        let second = desk
            .log_mistake(path("Ch. 8"), now() + Duration::seconds(1))
            .unwrap();

        let later = now() + Duration::minutes(1);
        let mut session = ReviewSession::start(&desk, later).unwrap();
        assert_eq!(session.total_count(), 2);
        assert_eq!(session.current_item().unwrap().id, first.id);

        session.grade_current(2, later).unwrap();
        session.next_item();
        session.grade_current(4, later).unwrap();
        assert_eq!(session.remaining_count(), 1);
        session.next_item();

        assert!(!session.is_completed());
        assert_eq!(session.round_number(), 2);
        assert_eq!(session.total_count(), 1);
        assert_eq!(session.current_item().unwrap().id, first.id);
        assert!(session.phase_message().contains("re-drill"));

        session.grade_current(3, later).unwrap();
        session.next_item();
        assert!(session.is_completed());

        assert_eq!(desk.get(first.id).unwrap().review_count, 2);
        assert_eq!(desk.get(second.id).unwrap().review_count, 1);
    }

    #[test]
    fn test_empty_session_is_completed() {
        let desk = desk();
        let session = ReviewSession::start(&desk, now()).unwrap();
        assert!(session.is_completed());
        assert!(session.current_item().is_none());
    }
}
