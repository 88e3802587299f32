//! Error types for scheduling and for the caller-facing review service.

use crate::database::StoreError;
use crate::models::ReviewItemId;
use thiserror::Error;

/// Contract violations detected by the scheduling engine.
///
/// Both variants are fatal to the call: the caller must fix its input
/// (or reactivate the item) before trying again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("performance score must be an integer between 1 and 5, got {0}")]
    InvalidScore(i64),

    #[error("review item {0} has already graduated")]
    AlreadyGraduated(ReviewItemId),
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("review item not found: {0}")]
    NotFound(ReviewItemId),

    #[error("review store lock was poisoned")]
    LockPoisoned,

    #[error("review session has no items left")]
    SessionFinished,
}

pub type Result<T> = std::result::Result<T, ReviewError>;
