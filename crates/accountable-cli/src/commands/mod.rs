pub mod calendar;
pub mod cluster;
pub mod config;
pub mod habit;
pub mod log;
pub mod streak;

use accountable_core::habit::log::parse_date_key;
use accountable_core::storage::{open_repository, KeyValueStore};
use accountable_core::{Config, HabitStore, LogRepository};
use chrono::NaiveDate;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub type CliStore = HabitStore<LogRepository<Box<dyn KeyValueStore>>>;

/// Load config and open a habit store over the configured backend.
pub fn open_store() -> Result<(Config, CliStore), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let repo = open_repository(&config)?;
    if repo.skipped_records() > 0 {
        eprintln!(
            "warning: skipped {} malformed log record(s)",
            repo.skipped_records()
        );
    }
    let store = HabitStore::from_config(repo, &config);
    Ok((config, store))
}

/// Parse `--date`, defaulting to today.
pub fn resolve_date(store: &CliStore, date: Option<&str>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(s) => Ok(parse_date_key(s)?),
        None => Ok(store.today()),
    }
}
