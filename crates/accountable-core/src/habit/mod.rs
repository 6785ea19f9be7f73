//! Habit tracking domain: logs, cluster rules, the habit store and streaks.

pub mod cluster;
pub mod log;
pub mod refresh;
pub mod store;
pub mod streak;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub use cluster::{Cluster, ClusterCategory, ClusterProgress, OverallProgress};
pub use log::HabitLog;
pub use refresh::StreakRefresh;
pub use store::{DaySummary, HabitStore, StorePhase, ToggleOutcome};
pub use streak::{ClusterStreak, StreakReport, StreakTier};

/// Source of "today" for edit-window and streak calculations.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    /// Instant used to schedule debounced streak refreshes.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }

    /// Midnight UTC at the start of the pinned date.
    fn now(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Trailing window of days, inclusive of today, during which logs may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditWindow {
    pub days: u32,
}

impl EditWindow {
    pub const DEFAULT_DAYS: u32 = 7;

    pub fn new(days: u32) -> Self {
        Self { days }
    }

    /// `0 <= today - date < days`, in whole calendar days.
    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        let days_diff = today.signed_duration_since(date).num_days();
        (0..i64::from(self.days)).contains(&days_diff)
    }
}

impl Default for EditWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn d(s: &str) -> NaiveDate {
        log::parse_date_key(s).unwrap()
    }

    #[test]
    fn window_boundaries() {
        let window = EditWindow::default();
        let today = d("2024-06-10");
        assert!(window.contains(today, today));
        assert!(window.contains(d("2024-06-04"), today));
        assert!(!window.contains(d("2024-06-03"), today));
        assert!(!window.contains(d("2024-06-11"), today));
        assert!(!window.contains(d("2024-06-01"), today));
    }

    #[test]
    fn window_spans_month_boundary() {
        let window = EditWindow::default();
        assert!(window.contains(d("2024-02-28"), d("2024-03-02")));
    }

    #[test]
    fn fixed_clock_reports_its_date() {
        assert_eq!(FixedClock(d("2024-06-10")).today(), d("2024-06-10"));
    }

    proptest! {
        #[test]
        fn editable_iff_diff_in_range(offset in -30i64..30) {
            let today = d("2024-06-10");
            let date = today - Duration::days(offset);
            prop_assert_eq!(
                EditWindow::default().contains(date, today),
                (0..7).contains(&offset)
            );
        }
    }
}
