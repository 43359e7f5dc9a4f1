use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::memos::{add_memo, delete_memo, filter_by_tags, update_memo};
use crate::migration::StartupReport;
use crate::models::{Category, RecordError, Session};
use crate::stats::{day_summary, sessions_on};
use crate::store::{Store, StoreError};
use crate::utils::{now_millis, split_minutes};

/// Longest session `session add` accepts: one day
pub const MAX_SESSION_MINUTES: i64 = 24 * 60;

#[derive(Parser)]
#[command(name = "minit")]
#[command(about = "Minit - focus timer data: sessions, memos and tags")]
#[command(version)]
pub struct Cli {
    /// Use development mode (uses separate dev config/data)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the result of this launch's data migration (default)
    Migrate,
    /// Show the data directory and any legacy data folders found
    Paths,
    /// Manage memos
    #[command(subcommand)]
    Memo(MemoCommand),
    /// Record or list sessions
    #[command(subcommand)]
    Session(SessionCommand),
    /// List registered session tags
    Tags,
    /// Today's totals
    Stats {
        /// Only count sessions carrying this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum MemoCommand {
    /// Add a memo; `#tags` in the text are picked up automatically
    Add { content: String },
    /// List memos
    List {
        /// Only memos carrying this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a memo by id
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Record a session that just ended
    Add {
        title: String,
        /// Minutes spent
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_SESSION_MINUTES))]
        minutes: i64,
        /// Stopped before the preset duration
        #[arg(long)]
        partial: bool,
        /// Ran out without the task being done
        #[arg(long, conflicts_with = "partial")]
        incomplete: bool,
    },
    /// List sessions, newest first
    List,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Invalid session: {0}")]
    RecordError(#[from] RecordError),
    #[error("Failed to encode output: {0}")]
    EncodeError(#[from] serde_json::Error),
    #[error("No memo with id {0}")]
    MemoNotFound(i64),
}

/// Print the startup migration report as JSON
pub fn handle_migrate(report: &StartupReport) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

pub fn handle_paths(store: &Store) -> Result<(), CliError> {
    println!("Data directory: {}", store.data_path().display());
    for category in Category::ALL {
        let path = store.paths().category_path(category);
        let state = if path.exists() { "" } else { " (absent)" };
        println!("  {}: {}{}", category, path.display(), state);
    }
    let candidates = store.paths().find_legacy_data_paths();
    if candidates.is_empty() {
        println!("No legacy data folders found");
    }
    for candidate in candidates {
        let modified: DateTime<Utc> = candidate.last_modified.into();
        println!(
            "Legacy: {} (last modified {})",
            candidate.path.display(),
            modified.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub fn handle_memo(command: MemoCommand, store: &Store) -> Result<(), CliError> {
    let mut memos = store.load_memos()?;
    match command {
        MemoCommand::Add { content } => {
            let id = add_memo(&mut memos, now_millis());
            update_memo(&mut memos, id, &content);
            store.save_memos(&memos)?;
            println!("Memo created successfully (ID: {})", id);
        }
        MemoCommand::List { tags } => {
            for memo in filter_by_tags(&memos, &tags) {
                println!("[{}] {} {}", memo.order, memo.id, memo.content);
            }
        }
        MemoCommand::Delete { id } => {
            if !delete_memo(&mut memos, id) {
                return Err(CliError::MemoNotFound(id));
            }
            store.save_memos(&memos)?;
            println!("Memo {} deleted", id);
        }
    }
    Ok(())
}

pub fn handle_session(command: SessionCommand, store: &Store) -> Result<(), CliError> {
    match command {
        SessionCommand::Add {
            title,
            minutes,
            partial,
            incomplete,
        } => {
            let ended = Utc::now();
            let started = ended - chrono::Duration::minutes(minutes);
            let id = now_millis();
            let session = if partial {
                Session::partial(id, title, minutes * 60, started, ended)?
            } else {
                Session::finished(id, title, minutes, !incomplete, started, ended)
            };
            store.record_session(session)?;
            println!("Session recorded (ID: {})", id);
        }
        SessionCommand::List => {
            for session in store.load_sessions()? {
                let local = session.timestamp.with_timezone(&Local);
                println!(
                    "{} {} - {}min {}{}",
                    local.format("%Y-%m-%d %H:%M"),
                    session.title,
                    session.duration,
                    if session.completed { "done" } else { "incomplete" },
                    if session.partial { " (partial)" } else { "" }
                );
            }
        }
    }
    Ok(())
}

pub fn handle_tags(store: &Store) -> Result<(), CliError> {
    for tag in store.load_tags()?.as_slice() {
        println!("#{}", tag);
    }
    Ok(())
}

pub fn handle_stats(tags: Vec<String>, store: &Store) -> Result<(), CliError> {
    let sessions = store.load_sessions()?;
    let today = Local::now().date_naive();
    let todays = sessions_on(&sessions, today, &Local, &tags);
    let summary = day_summary(&todays);
    let (hours, minutes) = split_minutes(summary.total_minutes);
    println!("Today: {}h {}m ({} hours)", hours, minutes, summary.total_hours);
    println!(
        "Sessions: {} (completed {}, in progress {})",
        summary.session_count, summary.completed_count, summary.in_progress_count
    );
    Ok(())
}
