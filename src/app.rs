//! Command handlers for the `wrong-notes` binary.
//! Each command opens the store, runs one desk operation and prints the result.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use wrong_notes::database::{ReviewStore, SqliteSessionLog, SqliteStore};
use wrong_notes::export::{export_json_to_path, import_json};
use wrong_notes::{
    Config, ReviewDesk, ReviewError, ReviewItem, ReviewItemId, ReviewOutcome, ReviewSession,
    ScheduleError, SubjectPath,
};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

pub struct App {
    desk: ReviewDesk<SqliteStore, SqliteSessionLog>,
    config: Config,
    format: OutputFormat,
    now_override: Option<DateTime<Utc>>,
}

/// Formats a timestamp as YYYY-MM-DD HH:MM (UTC)
fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_item_line(item: &ReviewItem) {
    println!(
        "{}  {}  stage {:>5}  ease {:.2}  reviews {:>3}  next {}{}",
        item.id,
        item.subject_path,
        item.interval_stage.to_string(),
        item.ease_factor,
        item.review_count,
        format_time(item.next_review_at),
        if item.is_completed { "  (graduated)" } else { "" }
    );
}

fn print_outcome(outcome: &ReviewOutcome) {
    println!(
        "next review {}  stage {}  ease {:.2}{}",
        format_time(outcome.next_review_at),
        outcome.new_stage,
        outcome.new_ease_factor,
        if outcome.is_completed { "  graduated" } else { "" }
    );
}

impl App {
    pub fn open(
        config: Config,
        format: OutputFormat,
        now_override: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path)?;
        let log = SqliteSessionLog::open(&config.database_path)?;
        let desk = ReviewDesk::new(store, log, config.scheduler());

        Ok(Self {
            desk,
            config,
            format,
            now_override,
        })
    }

    /// The explicit `--now`, or the store's simulated date.
    fn now(&self) -> Result<DateTime<Utc>> {
        if let Some(now) = self.now_override {
            return Ok(now);
        }
        let store = self.desk.store();
        let guard = store.lock().map_err(|_| ReviewError::LockPoisoned)?;
        Ok(guard.current_date()?)
    }

    fn print_items(&self, items: &[ReviewItem]) -> Result<()> {
        match self.format {
            OutputFormat::Json => print_json(items),
            OutputFormat::Plain => {
                if items.is_empty() {
                    println!("No items.");
                }
                items.iter().for_each(print_item_line);
                Ok(())
            }
        }
    }

    pub fn add(&self, subject: String, book: String, chapter: String) -> Result<()> {
        let item = self
            .desk
            .log_mistake(SubjectPath::new(subject, book, chapter), self.now()?)?;
        match self.format {
            OutputFormat::Json => print_json(&item),
            OutputFormat::Plain => {
                println!("{}", item.id);
                Ok(())
            }
        }
    }

    pub fn review(&self, id: ReviewItemId, score: i64) -> Result<()> {
        let outcome = self
            .desk
            .record_review(id, score, self.now()?)
            .with_context(|| format!("Failed to record review of {}", id))?;
        match self.format {
            OutputFormat::Json => print_json(&outcome),
            OutputFormat::Plain => {
                print_outcome(&outcome);
                Ok(())
            }
        }
    }

    pub fn due(&self) -> Result<()> {
        let items = self.desk.due_today(self.now()?)?;
        self.print_items(&items)
    }

    pub fn upcoming(&self, limit: Option<usize>) -> Result<()> {
        let limit = limit.unwrap_or(self.config.default_upcoming_limit);
        let items = self.desk.upcoming(self.now()?, limit)?;
        self.print_items(&items)
    }

    /// Interactive session: one score per line, blank line or EOF stops.
    pub fn drill(&self, mut input: impl BufRead) -> Result<()> {
        let mut session = ReviewSession::start(&self.desk, self.now()?)?;
        let mut round = 0;

        while let Some(item) = session.current_item() {
            if session.round_number() != round {
                round = session.round_number();
                println!("{}", session.phase_message());
            }

            print!("{} [{}] score 1-5: ", item.subject_path, item.interval_stage);
            io::stdout().flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 || line.trim().is_empty() {
                println!();
                break;
            }
            let Ok(score) = line.trim().parse::<i64>() else {
                println!("Not a number: {}", line.trim());
                continue;
            };

            match session.grade_current(score, self.now()?) {
                Ok(outcome) => {
                    print_outcome(&outcome);
                    session.next_item();
                }
                Err(ReviewError::Schedule(ScheduleError::InvalidScore(_))) => {
                    println!("Score must be between 1 and 5.");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if session.is_completed() {
            println!("Session complete.");
        } else {
            println!("{} items left in this round.", session.remaining_count());
        }
        Ok(())
    }

    pub fn reactivate(&self, id: ReviewItemId) -> Result<()> {
        let item = self.desk.reactivate(id, self.now()?)?;
        self.print_items(std::slice::from_ref(&item))
    }

    pub fn history(&self, id: ReviewItemId) -> Result<()> {
        let recorder = self.desk.recorder();
        let entries = recorder
            .lock()
            .map_err(|_| ReviewError::LockPoisoned)?
            .entries_for(id)?;

        match self.format {
            OutputFormat::Json => print_json(&entries),
            OutputFormat::Plain => {
                for entry in &entries {
                    println!("{}  score {}", format_time(entry.timestamp), entry.performance_score);
                }
                Ok(())
            }
        }
    }

    pub fn advance_day(&self) -> Result<()> {
        let store = self.desk.store();
        let next = store
            .lock()
            .map_err(|_| ReviewError::LockPoisoned)?
            .advance_day()?;
        println!("Current date: {}", format_time(next));
        Ok(())
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        let store = self.desk.store();
        let items = store.lock().map_err(|_| ReviewError::LockPoisoned)?.all()?;
        export_json_to_path(&items, path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        println!("Exported {} items to {}", items.len(), path.display());
        Ok(())
    }

    pub fn import(&self, path: &Path) -> Result<()> {
        let items = import_json(path)
            .with_context(|| format!("Failed to import from {}", path.display()))?;
        let store = self.desk.store();
        let mut guard = store.lock().map_err(|_| ReviewError::LockPoisoned)?;
        for item in &items {
            guard.put(item)?;
        }
        println!("Imported {} items from {}", items.len(), path.display());
        Ok(())
    }
}
