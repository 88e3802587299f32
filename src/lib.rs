//! Spaced-repetition scheduling for tracked mistakes ("wrong notes").
//!
//! Each mistake climbs a 1 → 3 → 7 → 14 → 30 day ladder while it keeps
//! being recalled, drops back to a sub-day retry when it is forgotten, and
//! carries a SuperMemo-style ease factor. The engine in [`models::scheduler`]
//! is pure and takes the current time as an argument; storage, the session
//! log and the CLI are thin collaborators around it.

pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;

pub use config::Config;
pub use error::{ReviewError, ScheduleError};
pub use models::{
    IntervalStage, PerformanceScore, ReviewDesk, ReviewItem, ReviewItemId, ReviewOutcome,
    ReviewSession, Scheduler, SessionLogEntry, SubjectPath,
};
