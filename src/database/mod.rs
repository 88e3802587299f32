//! Collaborators the scheduling engine reads from and writes to.
//!
//! The engine never calls these itself; the review service loads items,
//! runs the engine, then writes the result back and appends a log entry.

pub mod db;

pub use db::{SqliteSessionLog, SqliteStore};

use crate::models::{ReviewItem, ReviewItemId, SessionLogEntry};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable keyed storage for review items.
///
/// Query results carry no ordering guarantee; callers sort them.
pub trait ReviewStore {
    /// Stores a new item. Fails if the id already exists.
    fn insert(&mut self, item: &ReviewItem) -> Result<()>;

    fn get(&self, id: ReviewItemId) -> Result<Option<ReviewItem>>;

    /// Writes `item`, replacing any record with the same id.
    fn put(&mut self, item: &ReviewItem) -> Result<()>;

    /// Administrative removal. Returns whether a record existed.
    fn delete(&mut self, id: ReviewItemId) -> Result<bool>;

    fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<ReviewItem>>;

    fn query_upcoming(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReviewItem>>;

    fn all(&self) -> Result<Vec<ReviewItem>>;
}

/// Append-only log of review attempts.
pub trait SessionRecorder {
    fn append(&mut self, entry: &SessionLogEntry) -> Result<()>;
}
