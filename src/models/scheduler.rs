//! Review scheduling engine.
//!
//! Combines the interval and ease policies into a single review transition
//! and answers due/upcoming queries. Everything here is pure: the current
//! time is always passed in, nothing is read from the wall clock, and no
//! storage is touched. Callers must not run two `record_review` calls for
//! the same item concurrently.

use super::ease::next_ease_factor;
use super::interval::{SubDayMode, next_interval_stage};
use super::{IntervalStage, PerformanceScore, ReviewItem};
use crate::error::ScheduleError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Delay before an `ImmediateRetry` item comes back.
pub const IMMEDIATE_RETRY_MINUTES: i64 = 20;

/// Default minimum score that graduates an item.
pub const DEFAULT_GRADUATION_SCORE: u8 = 4;

/// Decides whether a review retires its item from active scheduling.
pub trait GraduationPolicy {
    fn graduates(&self, score: PerformanceScore) -> bool;
}

impl<F> GraduationPolicy for F
where
    F: Fn(PerformanceScore) -> bool,
{
    fn graduates(&self, score: PerformanceScore) -> bool {
        self(score)
    }
}

/// Graduates on any score at or above the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreThreshold(pub u8);

impl Default for ScoreThreshold {
    fn default() -> Self {
        Self(DEFAULT_GRADUATION_SCORE)
    }
}

impl GraduationPolicy for ScoreThreshold {
    fn graduates(&self, score: PerformanceScore) -> bool {
        score.value() >= self.0
    }
}

/// Keeps every item in rotation forever.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverGraduate;

impl GraduationPolicy for NeverGraduate {
    fn graduates(&self, _score: PerformanceScore) -> bool {
        false
    }
}

/// What a caller gets back from recording a review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub next_review_at: DateTime<Utc>,
    pub new_ease_factor: f64,
    pub new_stage: IntervalStage,
    pub is_completed: bool,
}

impl From<&ReviewItem> for ReviewOutcome {
    fn from(item: &ReviewItem) -> Self {
        Self {
            next_review_at: item.next_review_at,
            new_ease_factor: item.ease_factor,
            new_stage: item.interval_stage,
            is_completed: item.is_completed,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scheduler<G = ScoreThreshold> {
    sub_day: SubDayMode,
    graduation: G,
}

impl Scheduler<ScoreThreshold> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<G: GraduationPolicy> Scheduler<G> {
    pub fn with_policy(sub_day: SubDayMode, graduation: G) -> Self {
        Self {
            sub_day,
            graduation,
        }
    }

    pub fn sub_day_mode(&self) -> SubDayMode {
        self.sub_day
    }

    /// Applies one review to `item` and returns the updated copy.
    ///
    /// Fails with `InvalidScore` for scores outside 1-5 and with
    /// `AlreadyGraduated` for completed items. The input item is untouched,
    /// so a failed write can be retried by calling this again on the
    /// persisted record.
    pub fn record_review(
        &self,
        item: &ReviewItem,
        score: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewItem, ScheduleError> {
        let score = PerformanceScore::new(score)?;
        if item.is_completed {
            return Err(ScheduleError::AlreadyGraduated(item.id));
        }

        let new_stage = next_interval_stage(item.interval_stage, score, self.sub_day);
        let new_ease = next_ease_factor(item.ease_factor, score);

        let mut updated = item.clone();
        updated.interval_stage = new_stage;
        updated.ease_factor = new_ease;
        updated.next_review_at = next_review_at(new_stage, now);
        updated.is_completed = self.graduation.graduates(score);
        updated.review_count = item.review_count.saturating_add(1);
        updated.last_reviewed_at = Some(now);

        tracing::debug!(
            item = %item.id,
            score = score.value(),
            stage = %new_stage,
            ease = new_ease,
            completed = updated.is_completed,
            "review recorded"
        );

        Ok(updated)
    }
}

/// When an item granted `stage` at `now` should be reviewed next.
///
/// Day stages keep the time of day of `now`; there is no rounding to
/// midnight. `SameDayRetry` resolves to the next UTC midnight, which is
/// always strictly after `now`.
pub fn next_review_at(stage: IntervalStage, now: DateTime<Utc>) -> DateTime<Utc> {
    let immediate = now + Duration::minutes(IMMEDIATE_RETRY_MINUTES);
    match stage {
        IntervalStage::ImmediateRetry => immediate,
        IntervalStage::SameDayRetry => now
            .date_naive()
            .succ_opt()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .unwrap_or(immediate),
        IntervalStage::Days(days) => now
            .checked_add_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// The single due predicate shared by every query.
pub fn is_due(item: &ReviewItem, now: DateTime<Utc>) -> bool {
    !item.is_completed && item.next_review_at <= now
}

fn by_due_time(a: &ReviewItem, b: &ReviewItem) -> Ordering {
    a.next_review_at
        .cmp(&b.next_review_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Active items due at `now`, earliest first, ties broken by id.
pub fn due_today(
    items: impl IntoIterator<Item = ReviewItem>,
    now: DateTime<Utc>,
) -> Vec<ReviewItem> {
    let mut due: Vec<_> = items.into_iter().filter(|item| is_due(item, now)).collect();
    due.sort_by(by_due_time);
    due
}

/// Up to `limit` active items not yet due at `now`, soonest first.
pub fn upcoming(
    items: impl IntoIterator<Item = ReviewItem>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<ReviewItem> {
    let mut pending: Vec<_> = items
        .into_iter()
        .filter(|item| !item.is_completed && !is_due(item, now))
        .collect();
    pending.sort_by(by_due_time);
    pending.truncate(limit);
    pending
}
