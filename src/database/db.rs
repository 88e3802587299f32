//! SQLite-backed review store and session log.
//!
//! Handles schema initialization, review item CRUD, due-date queries,
//! the append-only session log, and the simulated "current date" used to
//! step through days without waiting for them.

use super::{ReviewStore, Result, SessionRecorder, StoreError};
use crate::models::{
    IntervalStage, PerformanceScore, ReviewItem, ReviewItemId, SessionLogEntry, SubjectPath,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

const ITEM_COLUMNS: &str = "id, subject, book, chapter, stage_kind, stage_days, ease_factor,
     review_count, next_review_at, is_completed, created_at, last_reviewed_at";

const STAGE_IMMEDIATE: &str = "immediate";
const STAGE_SAME_DAY: &str = "same_day";
const STAGE_DAYS: &str = "days";

/// Timestamps are stored as integer microseconds since the Unix epoch.
fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::InvalidRecord(format!("timestamp out of range: {}", micros)))
}

fn stage_columns(stage: IntervalStage) -> (&'static str, u32) {
    match stage {
        IntervalStage::ImmediateRetry => (STAGE_IMMEDIATE, 0),
        IntervalStage::SameDayRetry => (STAGE_SAME_DAY, 0),
        IntervalStage::Days(days) => (STAGE_DAYS, days),
    }
}

fn stage_from_columns(kind: &str, days: u32) -> Result<IntervalStage> {
    match kind {
        STAGE_IMMEDIATE => Ok(IntervalStage::ImmediateRetry),
        STAGE_SAME_DAY => Ok(IntervalStage::SameDayRetry),
        STAGE_DAYS => Ok(IntervalStage::Days(days)),
        other => Err(StoreError::InvalidRecord(format!("unknown stage kind: {}", other))),
    }
}

/// Raw column values of one `review_items` row.
struct ItemRow {
    id: String,
    subject: String,
    book: String,
    chapter: String,
    stage_kind: String,
    stage_days: u32,
    ease_factor: f64,
    review_count: u32,
    next_review_at: i64,
    is_completed: bool,
    created_at: i64,
    last_reviewed_at: Option<i64>,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            subject: row.get(1)?,
            book: row.get(2)?,
            chapter: row.get(3)?,
            stage_kind: row.get(4)?,
            stage_days: row.get(5)?,
            ease_factor: row.get(6)?,
            review_count: row.get(7)?,
            next_review_at: row.get(8)?,
            is_completed: row.get(9)?,
            created_at: row.get(10)?,
            last_reviewed_at: row.get(11)?,
        })
    }

    fn into_item(self) -> Result<ReviewItem> {
        let id = self
            .id
            .parse::<ReviewItemId>()
            .map_err(|e| StoreError::InvalidRecord(format!("bad item id {}: {}", self.id, e)))?;

        Ok(ReviewItem {
            id,
            subject_path: SubjectPath {
                subject: self.subject,
                book: self.book,
                chapter: self.chapter,
            },
            interval_stage: stage_from_columns(&self.stage_kind, self.stage_days)?,
            ease_factor: self.ease_factor,
            review_count: self.review_count,
            next_review_at: from_micros(self.next_review_at)?,
            is_completed: self.is_completed,
            created_at: from_micros(self.created_at)?,
            last_reviewed_at: self.last_reviewed_at.map(from_micros).transpose()?,
        })
    }
}

/// Review item storage on a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database file and its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::init(Connection::open(path)?)?;
        tracing::info!(path = %path.display(), "review store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS review_items (
                id TEXT PRIMARY KEY,
                subject TEXT NOT NULL,
                book TEXT NOT NULL,
                chapter TEXT NOT NULL,
                stage_kind TEXT NOT NULL,
                stage_days INTEGER NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                review_count INTEGER NOT NULL DEFAULT 0,
                next_review_at INTEGER NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                last_reviewed_at INTEGER
            )",
            (),
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_review_items_due
             ON review_items (is_completed, next_review_at)",
            (),
        )?;

        // Simulated clock, stepped with `advance_day`
        conn.execute(
            "CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            (),
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
            params![to_micros(Utc::now()).to_string()],
        )?;

        Ok(Self { conn })
    }

    /// Reads the simulated current date.
    pub fn current_date(&self) -> Result<DateTime<Utc>> {
        let value: String = self.conn.query_row(
            "SELECT value FROM app_state WHERE key = 'current_date'",
            [],
            |row| row.get(0),
        )?;

        let micros = value
            .parse::<i64>()
            .map_err(|e| StoreError::InvalidRecord(format!("current_date {}: {}", value, e)))?;
        from_micros(micros)
    }

    pub fn set_current_date(&self, date: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE app_state SET value = ?1 WHERE key = 'current_date'",
            params![to_micros(date).to_string()],
        )?;
        Ok(())
    }

    /// Advances the simulated date by 24 hours and returns the new date.
    pub fn advance_day(&self) -> Result<DateTime<Utc>> {
        let next_day = self.current_date()? + Duration::days(1);
        self.set_current_date(next_day)?;
        Ok(next_day)
    }

    fn query_items(&self, filter: &str, params: impl rusqlite::Params) -> Result<Vec<ReviewItem>> {
        let sql = format!("SELECT {} FROM review_items {}", ITEM_COLUMNS, filter);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, ItemRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }
}

impl ReviewStore for SqliteStore {
    fn insert(&mut self, item: &ReviewItem) -> Result<()> {
        let (stage_kind, stage_days) = stage_columns(item.interval_stage);
        self.conn.execute(
            &format!(
                "INSERT INTO review_items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                ITEM_COLUMNS
            ),
            params![
                item.id.to_string(),
                item.subject_path.subject,
                item.subject_path.book,
                item.subject_path.chapter,
                stage_kind,
                stage_days,
                item.ease_factor,
                item.review_count,
                to_micros(item.next_review_at),
                item.is_completed,
                to_micros(item.created_at),
                item.last_reviewed_at.map(to_micros),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: ReviewItemId) -> Result<Option<ReviewItem>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM review_items WHERE id = ?1", ITEM_COLUMNS),
                params![id.to_string()],
                ItemRow::from_row,
            )
            .optional()?;

        row.map(ItemRow::into_item).transpose()
    }

    fn put(&mut self, item: &ReviewItem) -> Result<()> {
        let (stage_kind, stage_days) = stage_columns(item.interval_stage);
        self.conn.execute(
            &format!(
                "INSERT INTO review_items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                    subject = excluded.subject,
                    book = excluded.book,
                    chapter = excluded.chapter,
                    stage_kind = excluded.stage_kind,
                    stage_days = excluded.stage_days,
                    ease_factor = excluded.ease_factor,
                    review_count = excluded.review_count,
                    next_review_at = excluded.next_review_at,
                    is_completed = excluded.is_completed,
                    created_at = excluded.created_at,
                    last_reviewed_at = excluded.last_reviewed_at",
                ITEM_COLUMNS
            ),
            params![
                item.id.to_string(),
                item.subject_path.subject,
                item.subject_path.book,
                item.subject_path.chapter,
                stage_kind,
                stage_days,
                item.ease_factor,
                item.review_count,
                to_micros(item.next_review_at),
                item.is_completed,
                to_micros(item.created_at),
                item.last_reviewed_at.map(to_micros),
            ],
        )?;
        Ok(())
    }

    fn delete(&mut self, id: ReviewItemId) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM review_items WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<ReviewItem>> {
        self.query_items(
            "WHERE is_completed = 0 AND next_review_at <= ?1",
            params![to_micros(now)],
        )
    }

    fn query_upcoming(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReviewItem>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_items(
            "WHERE is_completed = 0 AND next_review_at > ?1
             ORDER BY next_review_at ASC, id ASC LIMIT ?2",
            params![to_micros(now), limit],
        )
    }

    fn all(&self) -> Result<Vec<ReviewItem>> {
        self.query_items("ORDER BY created_at ASC", [])
    }
}

/// Append-only review history on its own connection.
pub struct SqliteSessionLog {
    conn: Connection,
}

impl SqliteSessionLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                review_item_id TEXT NOT NULL,
                performance_score INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            (),
        )?;
        Ok(Self { conn })
    }

    /// All attempts recorded for one item, oldest first.
    pub fn entries_for(&self, id: ReviewItemId) -> Result<Vec<SessionLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT performance_score, timestamp FROM session_log
             WHERE review_item_id = ?1
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt
            .query_map(params![id.to_string()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(score, timestamp)| {
                let score = PerformanceScore::new(score)
                    .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
                Ok(SessionLogEntry::new(id, score, from_micros(timestamp)?))
            })
            .collect()
    }
}

impl SessionRecorder for SqliteSessionLog {
    fn append(&mut self, entry: &SessionLogEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO session_log (review_item_id, performance_score, timestamp)
             VALUES (?1, ?2, ?3)",
            params![
                entry.review_item_id.to_string(),
                entry.performance_score.value(),
                to_micros(entry.timestamp),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
    }

    fn sample_item(due: DateTime<Utc>) -> ReviewItem {
        let mut item = ReviewItem::new(SubjectPath::new("History", "Modern Europe", "Ch. 7"), now());
        item.next_review_at = due;
        item
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut item = sample_item(now());
        item.interval_stage = IntervalStage::Days(14);
        item.ease_factor = 1.9400000000000002;
        item.last_reviewed_at = Some(now() - Duration::days(14));

        store.insert(&item).unwrap();
        let loaded = store.get(item.id).unwrap().unwrap();

        assert_eq!(loaded, item);
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let item = sample_item(now());

        store.insert(&item).unwrap();
        assert!(store.insert(&item).is_err());
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get(ReviewItemId::new()).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut item = sample_item(now());
        store.insert(&item).unwrap();

        item.interval_stage = IntervalStage::SameDayRetry;
        item.review_count = 3;
        item.is_completed = true;
        store.put(&item).unwrap();

        let loaded = store.get(item.id).unwrap().unwrap();
        assert_eq!(loaded.interval_stage, IntervalStage::SameDayRetry);
        assert_eq!(loaded.review_count, 3);
        assert!(loaded.is_completed);
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn test_delete() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let item = sample_item(now());
        store.insert(&item).unwrap();

        assert!(store.delete(item.id).unwrap());
        assert!(!store.delete(item.id).unwrap());
        assert!(store.get(item.id).unwrap().is_none());
    }

    #[test]
    fn test_due_and_upcoming_queries() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let overdue = sample_item(now() - Duration::days(1));
        let exact = sample_item(now());
        let later = sample_item(now() + Duration::hours(2));
        let mut done = sample_item(now() - Duration::days(2));
        done.is_completed = true;

        for item in [&overdue, &exact, &later, &done] {
            store.insert(item).unwrap();
        }

        let due: Vec<_> = store.query_due(now()).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(due.len(), 2);
        assert!(due.contains(&overdue.id));
        assert!(due.contains(&exact.id));

        let upcoming = store.query_upcoming(now(), 10).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, later.id);
        assert!(store.query_upcoming(now(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_simulated_clock() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_current_date(now()).unwrap();

        let next = store.advance_day().unwrap();

        assert_eq!(next, now() + Duration::days(1));
        assert_eq!(store.current_date().unwrap(), next);
    }

    #[test]
    fn test_session_log_append_and_read() {
        let mut log = SqliteSessionLog::open_in_memory().unwrap();
        let id = ReviewItemId::new();
        let other = ReviewItemId::new();

        for (score, minutes) in [(2, 0), (4, 25)] {
            let entry = SessionLogEntry::new(
                id,
                PerformanceScore::new(score).unwrap(),
                now() + Duration::minutes(minutes),
            );
            log.append(&entry).unwrap();
        }
        log.append(&SessionLogEntry::new(other, PerformanceScore::new(5).unwrap(), now()))
            .unwrap();

        let entries = log.entries_for(id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].performance_score.value(), 2);
        assert_eq!(entries[1].timestamp, now() + Duration::minutes(25));
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.sqlite3");

        let mut store = SqliteStore::open(&path).unwrap();
        store.insert(&sample_item(now())).unwrap();

        assert!(path.exists());
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.all().unwrap().len(), 1);
    }
}
