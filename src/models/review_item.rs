//! A review item is one tracked mistake ("wrong note") under spaced review.
use super::ease::MIN_EASE_FACTOR;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ease factor given to every freshly logged mistake.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewItemId(pub Uuid);

impl ReviewItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReviewItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReviewItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReviewItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Where the mistake came from. Provenance only, never read by the scheduler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPath {
    pub subject: String,
    pub book: String,
    pub chapter: String,
}

impl SubjectPath {
    pub fn new(
        subject: impl Into<String>,
        book: impl Into<String>,
        chapter: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            book: book.into(),
            chapter: chapter.into(),
        }
    }
}

impl fmt::Display for SubjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.subject, self.book, self.chapter)
    }
}

/// Spacing granted by the last review.
///
/// The two sub-day variants differ only in how the next review time is
/// derived: `ImmediateRetry` is 20 minutes after the review, `SameDayRetry`
/// is the end of the review's calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntervalStage {
    ImmediateRetry,
    SameDayRetry,
    Days(u32),
}

impl IntervalStage {
    pub fn is_sub_day(self) -> bool {
        matches!(self, Self::ImmediateRetry | Self::SameDayRetry)
    }

    /// Whole days of spacing, sub-day stages counting as 0.
    pub fn days(self) -> u32 {
        match self {
            Self::ImmediateRetry | Self::SameDayRetry => 0,
            Self::Days(days) => days,
        }
    }
}

impl Default for IntervalStage {
    fn default() -> Self {
        Self::ImmediateRetry
    }
}

impl fmt::Display for IntervalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImmediateRetry => write!(f, "20m"),
            Self::SameDayRetry => write!(f, "today"),
            Self::Days(days) => write!(f, "{}d", days),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub id: ReviewItemId,
    pub subject_path: SubjectPath,
    pub interval_stage: IntervalStage,
    pub ease_factor: f64,
    pub review_count: u32,
    pub next_review_at: DateTime<Utc>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewItem {
    /// A freshly logged mistake, due immediately.
    pub fn new(subject_path: SubjectPath, now: DateTime<Utc>) -> Self {
        Self {
            id: ReviewItemId::new(),
            subject_path,
            interval_stage: IntervalStage::ImmediateRetry,
            ease_factor: DEFAULT_EASE_FACTOR,
            review_count: 0,
            next_review_at: now,
            is_completed: false,
            created_at: now,
            last_reviewed_at: None,
        }
    }

    /// Puts a graduated item back into active scheduling, due at `now`.
    /// Stage, ease and review count are kept.
    pub fn reactivate(&mut self, now: DateTime<Utc>) {
        self.is_completed = false;
        self.next_review_at = now;
    }

    /// Checks the invariants a record from outside the engine must hold.
    pub fn validate(&self) -> Result<(), String> {
        if !self.ease_factor.is_finite() || self.ease_factor < MIN_EASE_FACTOR {
            return Err(format!(
                "item {}: ease factor {} is below {}",
                self.id, self.ease_factor, MIN_EASE_FACTOR
            ));
        }
        Ok(())
    }
}
