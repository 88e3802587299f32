mod app;

use anyhow::Context;
use app::{App, OutputFormat};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use wrong_notes::{Config, ReviewItemId};

#[derive(Parser)]
#[command(name = "wrong-notes", about = "Spaced review of tracked mistakes", version)]
struct Cli {
    /// Configuration file (default: <config dir>/wrong-notes/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overrides the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Use this instant instead of the stored simulated date (RFC 3339)
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start tracking a new mistake, due immediately
    Add {
        subject: String,
        book: String,
        chapter: String,
    },

    /// Record a review with a 1-5 performance score
    Review { id: ReviewItemId, score: i64 },

    /// List items due now
    Due,

    /// List items coming up next
    Upcoming {
        /// Maximum items (default from configuration)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Review everything due, re-drilling failed items until they pass
    Drill,

    /// Return a graduated item to active review
    Reactivate { id: ReviewItemId },

    /// Show the review log of an item
    History { id: ReviewItemId },

    /// Move the simulated date forward by one day
    AdvanceDay,

    /// Write all review items to a JSON file
    Export { path: PathBuf },

    /// Load review items from a JSON file, replacing items with the same id
    Import { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let app = App::open(config, cli.format, cli.now).context("Failed to open review store")?;

    match cli.command {
        Command::Add {
            subject,
            book,
            chapter,
        } => app.add(subject, book, chapter),
        Command::Review { id, score } => app.review(id, score),
        Command::Due => app.due(),
        Command::Upcoming { limit } => app.upcoming(limit),
        Command::Drill => app.drill(io::stdin().lock()),
        Command::Reactivate { id } => app.reactivate(id),
        Command::History { id } => app.history(id),
        Command::AdvanceDay => app.advance_day(),
        Command::Export { path } => app.export(&path),
        Command::Import { path } => app.import(&path),
    }
}
