//! # Accountable Core Library
//!
//! Local-first habit tracking: daily completion logs, cluster quotas and
//! streaks. The `accountable` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Repository**: key-value persistence of daily [`HabitLog`]s, keyed by
//!   `YYYY-MM-DD`, written through on every change
//! - **Cluster evaluation**: pure quota checks over a day's completed set
//! - **Habit Store**: the viewed date, the 7-day edit window, toggles and
//!   streak computation
//! - **Storage**: SQLite, JSON-file and in-memory key-value backends plus
//!   TOML configuration
//!
//! ## Key Components
//!
//! - [`HabitStore`]: session coordinator
//! - [`LogRepository`]: the [`HabitRepository`] implementation
//! - [`Config`]: application configuration management

pub mod error;
pub mod habit;
pub mod storage;

pub use error::{ConfigError, CoreError, Result, StorageError, ValidationError};
pub use habit::{
    Clock, Cluster, ClusterCategory, ClusterProgress, ClusterStreak, DaySummary, EditWindow,
    FixedClock, HabitLog, HabitStore, OverallProgress, StorePhase, StreakRefresh, StreakReport,
    StreakTier, SystemClock, ToggleOutcome,
};
pub use storage::{Config, HabitRepository, KeyValueStore, LogRepository};
