//! Habit store: the session coordinator between a UI and the repository.
//!
//! The store owns the currently viewed date and a cache of its completed
//! habit ids. The cache is rebuilt from the repository on every
//! [`HabitStore::load_date`] and is never authoritative. Mutations are
//! written to the repository first; the cache only changes once the write
//! has succeeded.
//!
//! Every load and successful mutation also queues a debounced streak
//! refresh. Callers drive it with [`HabitStore::poll_streak_refresh`] on a
//! timer, or [`HabitStore::flush_streak_refresh`] before exiting.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::cluster::{self, Cluster, ClusterProgress, OverallProgress};
use super::log::{month_bounds, week_bounds, HabitLog};
use super::refresh::StreakRefresh;
use super::streak::{self, StreakReport, StreakTier};
use super::{Clock, EditWindow, SystemClock};
use crate::error::{CoreError, Result};
use crate::storage::{Config, HabitRepository, StreakTierConfig};

/// Whether a `load_date` call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorePhase {
    Idle,
    Loading,
}

/// Result of a successful toggle or set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub date: NaiveDate,
    pub habit_id: String,
    pub completed: bool,
}

/// Cluster completion for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub logged: bool,
    pub clusters_complete: usize,
    pub total_clusters: usize,
    pub all_complete: bool,
}

/// Debounce applied to streak refreshes unless configured otherwise.
pub const DEFAULT_STREAK_REFRESH_MS: u64 = 1000;

pub struct HabitStore<R: HabitRepository> {
    repo: R,
    clusters: Vec<Cluster>,
    window: EditWindow,
    lookback_days: u32,
    tiers: StreakTierConfig,
    clock: Arc<dyn Clock>,
    phase: StorePhase,
    current_date: Option<NaiveDate>,
    completed: BTreeSet<String>,
    refresh: StreakRefresh,
}

impl<R: HabitRepository> HabitStore<R> {
    /// Create a store with the default window, lookback and system clock.
    pub fn new(repo: R, clusters: Vec<Cluster>) -> Self {
        Self {
            repo,
            clusters,
            window: EditWindow::default(),
            lookback_days: streak::DEFAULT_LOOKBACK_DAYS,
            tiers: StreakTierConfig::default(),
            clock: Arc::new(SystemClock),
            phase: StorePhase::Idle,
            current_date: None,
            completed: BTreeSet::new(),
            refresh: StreakRefresh::new(DEFAULT_STREAK_REFRESH_MS),
        }
    }

    /// Create a store using the clusters and policy from `config`.
    pub fn from_config(repo: R, config: &Config) -> Self {
        Self::new(repo, config.clusters.clone())
            .with_edit_window(EditWindow::new(config.tracker.edit_window_days))
            .with_lookback_days(config.tracker.streak_lookback_days)
            .with_tiers(config.streak_tiers)
            .with_streak_refresh_ms(config.tracker.streak_refresh_ms)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_edit_window(mut self, window: EditWindow) -> Self {
        self.window = window;
        self
    }

    /// Days walked back for streaks, clamped to
    /// [`streak::MAX_LOOKBACK_DAYS`].
    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days.min(streak::MAX_LOOKBACK_DAYS);
        self
    }

    pub fn with_streak_refresh_ms(mut self, interval_ms: u64) -> Self {
        self.refresh = StreakRefresh::new(interval_ms);
        self
    }

    pub fn with_tiers(mut self, tiers: StreakTierConfig) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn phase(&self) -> StorePhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == StorePhase::Loading
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.current_date
    }

    pub fn completed_habits(&self) -> &BTreeSet<String> {
        &self.completed
    }

    /// Load `date` and replace the cached completed set.
    ///
    /// A missing log loads as an empty day. On error the previously loaded
    /// date and set are kept.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if the repository cannot be read.
    pub fn load_date(&mut self, date: NaiveDate) -> Result<()> {
        self.phase = StorePhase::Loading;
        let loaded = self.repo.get_log(date);
        self.phase = StorePhase::Idle;

        let completed = loaded?.map(|log| log.completed_ids()).unwrap_or_default();
        tracing::debug!(date = %date, completed = completed.len(), "loaded date");
        self.current_date = Some(date);
        self.completed = completed;
        self.request_streak_refresh();
        Ok(())
    }

    /// `0 <= today - date < window` at day granularity.
    pub fn is_date_editable(&self, date: NaiveDate) -> bool {
        self.window.contains(date, self.clock.today())
    }

    /// Flip `habit_id` on the loaded date.
    ///
    /// # Errors
    /// - [`CoreError::NoDateLoaded`] before any `load_date`.
    /// - [`CoreError::EditWindowViolation`] if the loaded date is outside
    ///   the edit window; nothing is written.
    /// - [`CoreError::Storage`] if the write fails; the cache is unchanged.
    pub fn toggle_habit(&mut self, habit_id: &str) -> Result<ToggleOutcome> {
        let target = !self.completed.contains(habit_id);
        self.set_habit(habit_id, target)
    }

    /// Set `habit_id` on the loaded date to `completed`. Idempotent.
    ///
    /// # Errors
    /// Same as [`HabitStore::toggle_habit`].
    pub fn set_habit(&mut self, habit_id: &str, completed: bool) -> Result<ToggleOutcome> {
        let date = self.editable_date()?;

        if completed {
            self.repo.mark_complete(habit_id, date)?;
            self.completed.insert(habit_id.to_string());
        } else {
            self.repo.mark_incomplete(habit_id, date)?;
            self.completed.remove(habit_id);
        }

        tracing::info!(habit = habit_id, date = %date, completed, "habit updated");
        self.request_streak_refresh();
        Ok(ToggleOutcome {
            date,
            habit_id: habit_id.to_string(),
            completed,
        })
    }

    fn editable_date(&self) -> Result<NaiveDate> {
        let date = self.current_date.ok_or(CoreError::NoDateLoaded)?;
        if !self.is_date_editable(date) {
            tracing::warn!(date = %date, window_days = self.window.days, "edit outside window rejected");
            return Err(CoreError::EditWindowViolation {
                date,
                window_days: self.window.days,
            });
        }
        Ok(date)
    }

    /// Overall streak ending today. Recomputed from the repository.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if a log cannot be read.
    pub fn calculate_streak(&self) -> Result<u32> {
        Ok(streak::calculate_streak(
            &self.repo,
            &self.clusters,
            self.clock.today(),
            self.lookback_days,
        )?)
    }

    /// Overall streak, its tier, and per-cluster streaks.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if logs cannot be read.
    pub fn streak_report(&self) -> Result<StreakReport> {
        let today = self.clock.today();
        let overall =
            streak::calculate_streak(&self.repo, &self.clusters, today, self.lookback_days)?;
        let clusters = streak::cluster_streaks(
            &self.repo,
            &self.clusters,
            today,
            self.lookback_days,
            &self.tiers,
        )?;
        Ok(StreakReport {
            as_of: today,
            streak: overall,
            tier: StreakTier::for_days(overall, &self.tiers),
            clusters,
        })
    }

    fn request_streak_refresh(&mut self) {
        let Some(date) = self.current_date else {
            return;
        };
        let key = StreakRefresh::key_for(date, &self.completed);
        if self.refresh.request(key, self.clock.now()) {
            tracing::trace!(date = %date, "streak refresh scheduled");
        }
    }

    /// Compute the streak report if a queued refresh is due at `now`.
    ///
    /// Returns `None` while the debounce interval is still running, or when
    /// nothing changed since the last computed report.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if logs cannot be read; the refresh
    /// stays queued.
    pub fn poll_streak_refresh(&mut self, now: DateTime<Utc>) -> Result<Option<StreakReport>> {
        match self.refresh.take_due(now) {
            Some(key) => self.compute_refresh(key, now).map(Some),
            None => Ok(None),
        }
    }

    /// Compute a queued refresh immediately, ignoring the debounce.
    ///
    /// # Errors
    /// Same as [`HabitStore::poll_streak_refresh`].
    pub fn flush_streak_refresh(&mut self) -> Result<Option<StreakReport>> {
        match self.refresh.take_pending() {
            Some(key) => {
                let now = self.clock.now();
                self.compute_refresh(key, now).map(Some)
            }
            None => Ok(None),
        }
    }

    fn compute_refresh(&mut self, key: String, now: DateTime<Utc>) -> Result<StreakReport> {
        match self.streak_report() {
            Ok(report) => {
                tracing::debug!(streak = report.streak, "streak refreshed");
                self.refresh.mark_computed(key);
                Ok(report)
            }
            Err(e) => {
                self.refresh.request(key, now);
                Err(e)
            }
        }
    }

    /// Progress of each cluster on the loaded date, in configuration order.
    pub fn cluster_progress(&self) -> Vec<(String, ClusterProgress)> {
        self.clusters
            .iter()
            .map(|c| (c.id.clone(), cluster::progress(c, &self.completed)))
            .collect()
    }

    pub fn overall_progress(&self) -> OverallProgress {
        cluster::overall_progress(&self.clusters, &self.completed)
    }

    /// Logs for the calendar month containing `date`, keyed by day.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if logs cannot be read.
    pub fn month_logs(&self, date: NaiveDate) -> Result<BTreeMap<NaiveDate, HabitLog>> {
        let (start, end) = month_bounds(date);
        self.logs_between(start, end)
    }

    /// Logs for the Monday-to-Sunday week containing `date`, keyed by day.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if logs cannot be read.
    pub fn week_logs(&self, date: NaiveDate) -> Result<BTreeMap<NaiveDate, HabitLog>> {
        let (start, end) = week_bounds(date);
        self.logs_between(start, end)
    }

    /// One summary per day of the month containing `date`.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if logs cannot be read.
    pub fn month_summary(&self, date: NaiveDate) -> Result<Vec<DaySummary>> {
        let (start, end) = month_bounds(date);
        self.summarize(start, end)
    }

    /// One summary per day of the week containing `date`.
    ///
    /// # Errors
    /// Returns [`CoreError::Storage`] if logs cannot be read.
    pub fn week_summary(&self, date: NaiveDate) -> Result<Vec<DaySummary>> {
        let (start, end) = week_bounds(date);
        self.summarize(start, end)
    }

    fn logs_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, HabitLog>> {
        Ok(self
            .repo
            .get_date_range(start, end)?
            .into_iter()
            .map(|log| (log.date, log))
            .collect())
    }

    fn summarize(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DaySummary>> {
        let logs = self.logs_between(start, end)?;
        let days = (end - start).num_days();
        Ok((0..=days)
            .map(|offset| {
                let date = start + Duration::days(offset);
                let completed = logs
                    .get(&date)
                    .map(HabitLog::completed_ids)
                    .unwrap_or_default();
                let overall = cluster::overall_progress(&self.clusters, &completed);
                DaySummary {
                    date,
                    logged: logs.contains_key(&date),
                    clusters_complete: overall.completed,
                    total_clusters: overall.total,
                    all_complete: logs.contains_key(&date)
                        && overall.completed == overall.total,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::habit::cluster::{default_clusters, ClusterCategory};
    use crate::habit::log::parse_date_key;
    use crate::habit::FixedClock;
    use crate::storage::{LogRepository, MemoryStore};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn d(s: &str) -> NaiveDate {
        parse_date_key(s).unwrap()
    }

    fn store_at(today: &str) -> HabitStore<LogRepository<MemoryStore>> {
        let repo = LogRepository::open(MemoryStore::new(), "logs").unwrap();
        HabitStore::new(repo, default_clusters()).with_clock(Arc::new(FixedClock(d(today))))
    }

    /// Repository whose reads and writes can be switched off.
    struct FlakyRepository {
        inner: LogRepository<MemoryStore>,
        down: AtomicBool,
    }

    impl FlakyRepository {
        fn new() -> Self {
            Self {
                inner: LogRepository::open(MemoryStore::new(), "logs").unwrap(),
                down: AtomicBool::new(false),
            }
        }

        fn inner(&self) -> Result<&LogRepository<MemoryStore>, StorageError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StorageError::Locked);
            }
            Ok(&self.inner)
        }
    }

    impl HabitRepository for FlakyRepository {
        fn mark_complete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError> {
            self.inner()?.mark_complete(habit_id, date)
        }

        fn mark_incomplete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError> {
            self.inner()?.mark_incomplete(habit_id, date)
        }

        fn get_log(&self, date: NaiveDate) -> Result<Option<HabitLog>, StorageError> {
            self.inner()?.get_log(date)
        }

        fn get_date_range(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<HabitLog>, StorageError> {
            self.inner()?.get_date_range(start, end)
        }
    }

    #[test]
    fn toggle_before_load_is_rejected() {
        let mut store = store_at("2024-06-10");
        assert!(matches!(
            store.toggle_habit("meditation"),
            Err(CoreError::NoDateLoaded)
        ));
    }

    #[test]
    fn toggle_twice_restores_original() {
        let mut store = store_at("2024-06-10");
        let today = d("2024-06-10");
        store.load_date(today).unwrap();

        let first = store.toggle_habit("meditation").unwrap();
        assert!(first.completed);
        assert!(store.repository().is_complete("meditation", today).unwrap());
        assert!(store.completed_habits().contains("meditation"));

        let second = store.toggle_habit("meditation").unwrap();
        assert!(!second.completed);
        assert!(!store.repository().is_complete("meditation", today).unwrap());
        assert!(store.completed_habits().is_empty());
    }

    #[test]
    fn toggle_outside_window_leaves_log_untouched() {
        let mut store = store_at("2024-06-10");
        store.load_date(d("2024-06-01")).unwrap();
        let err = store.toggle_habit("meditation").unwrap_err();
        assert!(matches!(
            err,
            CoreError::EditWindowViolation { window_days: 7, .. }
        ));
        assert!(store.repository().get_log(d("2024-06-01")).unwrap().is_none());
        assert!(store.completed_habits().is_empty());
    }

    #[test]
    fn future_dates_are_not_editable() {
        let mut store = store_at("2024-06-10");
        store.load_date(d("2024-06-11")).unwrap();
        assert!(store.set_habit("water", true).is_err());
    }

    #[test]
    fn load_date_reflects_persisted_state() {
        let mut store = store_at("2024-06-10");
        store.repository().mark_complete("water", d("2024-06-09")).unwrap();
        store.repository().mark_incomplete("reading", d("2024-06-09")).unwrap();

        store.load_date(d("2024-06-09")).unwrap();
        assert_eq!(
            store.completed_habits(),
            &BTreeSet::from(["water".to_string()])
        );

        store.load_date(d("2024-06-08")).unwrap();
        assert!(store.completed_habits().is_empty());
        assert_eq!(store.current_date(), Some(d("2024-06-08")));
        assert_eq!(store.phase(), StorePhase::Idle);
    }

    #[test]
    fn set_habit_is_idempotent() {
        let mut store = store_at("2024-06-10");
        store.load_date(d("2024-06-10")).unwrap();
        store.set_habit("water", true).unwrap();
        store.set_habit("water", true).unwrap();
        assert!(store.completed_habits().contains("water"));
        store.set_habit("water", false).unwrap();
        store.set_habit("water", false).unwrap();
        let log = store.repository().get_log(d("2024-06-10")).unwrap().unwrap();
        assert_eq!(log.habits.get("water"), Some(&false));
    }

    #[test]
    fn failed_write_keeps_cache_consistent() {
        let repo = FlakyRepository::new();
        let mut store = HabitStore::new(repo, default_clusters())
            .with_clock(Arc::new(FixedClock(d("2024-06-10"))));
        store.load_date(d("2024-06-10")).unwrap();

        store.repository().down.store(true, Ordering::SeqCst);
        let err = store.toggle_habit("water").unwrap_err();
        assert!(err.is_retryable());
        assert!(store.completed_habits().is_empty());

        store.repository().down.store(false, Ordering::SeqCst);
        assert!(store.toggle_habit("water").unwrap().completed);
    }

    #[test]
    fn failed_load_keeps_previous_date() {
        let repo = FlakyRepository::new();
        let mut store = HabitStore::new(repo, default_clusters())
            .with_clock(Arc::new(FixedClock(d("2024-06-10"))));
        store.load_date(d("2024-06-10")).unwrap();
        store.toggle_habit("water").unwrap();

        store.repository().down.store(true, Ordering::SeqCst);
        assert!(store.load_date(d("2024-06-09")).is_err());
        assert_eq!(store.current_date(), Some(d("2024-06-10")));
        assert!(store.completed_habits().contains("water"));
        assert!(!store.is_loading());
    }

    #[test]
    fn progress_reports_loaded_date() {
        let mut store = store_at("2024-06-10");
        store.load_date(d("2024-06-10")).unwrap();
        for habit in ["workout", "walk", "meditation"] {
            store.toggle_habit(habit).unwrap();
        }
        let progress = store.cluster_progress();
        assert_eq!(progress[0], ("physical".to_string(), ClusterProgress { completed: 2, required: 2 }));
        assert_eq!(progress[1].1.completed, 1);
        assert_eq!(store.overall_progress().completed, 1);
    }

    #[test]
    fn streak_report_combines_overall_and_clusters() {
        let clusters = vec![Cluster::new("c", "C", ClusterCategory::Diet, ["water"], 1)];
        let repo = LogRepository::open(MemoryStore::new(), "logs").unwrap();
        let mut store = HabitStore::new(repo, clusters)
            .with_clock(Arc::new(FixedClock(d("2024-06-10"))));

        for date in ["2024-06-08", "2024-06-09", "2024-06-10"] {
            store.load_date(d(date)).unwrap();
            store.toggle_habit("water").unwrap();
        }

        assert_eq!(store.calculate_streak().unwrap(), 3);
        let report = store.streak_report().unwrap();
        assert_eq!(report.streak, 3);
        assert_eq!(report.tier, StreakTier::Bronze);
        assert_eq!(report.clusters[0].current_streak, 3);
        assert_eq!(report.as_of, d("2024-06-10"));
    }

    #[test]
    fn streak_refresh_is_debounced() {
        let clusters = vec![Cluster::new("c", "C", ClusterCategory::Diet, ["water"], 1)];
        let repo = LogRepository::open(MemoryStore::new(), "logs").unwrap();
        let mut store = HabitStore::new(repo, clusters)
            .with_clock(Arc::new(FixedClock(d("2024-06-10"))))
            .with_streak_refresh_ms(1000);
        let t0 = FixedClock(d("2024-06-10")).now();

        assert_eq!(store.poll_streak_refresh(t0).unwrap(), None);

        store.load_date(d("2024-06-10")).unwrap();
        store.toggle_habit("water").unwrap();
        assert_eq!(
            store
                .poll_streak_refresh(t0 + Duration::milliseconds(999))
                .unwrap(),
            None
        );

        let report = store
            .poll_streak_refresh(t0 + Duration::milliseconds(1000))
            .unwrap()
            .unwrap();
        assert_eq!(report.streak, 1);

        // Reloading the same day with the same habits does not recompute.
        store.load_date(d("2024-06-10")).unwrap();
        assert_eq!(store.flush_streak_refresh().unwrap(), None);

        store.toggle_habit("water").unwrap();
        assert_eq!(store.flush_streak_refresh().unwrap().unwrap().streak, 0);
    }

    #[test]
    fn failed_streak_refresh_stays_queued() {
        let repo = FlakyRepository::new();
        let mut store = HabitStore::new(repo, default_clusters())
            .with_clock(Arc::new(FixedClock(d("2024-06-10"))));
        store.load_date(d("2024-06-10")).unwrap();

        store.repository().down.store(true, Ordering::SeqCst);
        assert!(store.flush_streak_refresh().is_err());

        store.repository().down.store(false, Ordering::SeqCst);
        assert!(store.flush_streak_refresh().unwrap().is_some());
        assert_eq!(store.flush_streak_refresh().unwrap(), None);
    }

    #[test]
    fn from_config_clamps_lookback() {
        let mut config = Config::default();
        config.tracker.streak_lookback_days = u32::MAX;
        let repo = LogRepository::open(MemoryStore::new(), "logs").unwrap();
        let store = HabitStore::from_config(repo, &config)
            .with_clock(Arc::new(FixedClock(d("2024-06-10"))));
        assert_eq!(store.streak_report().unwrap().streak, 0);
    }

    #[test]
    fn month_summary_covers_every_day() {
        let mut store = store_at("2024-02-10");
        store.load_date(d("2024-02-10")).unwrap();
        store.toggle_habit("water").unwrap();

        let summary = store.month_summary(d("2024-02-10")).unwrap();
        assert_eq!(summary.len(), 29);
        let tenth = &summary[9];
        assert_eq!(tenth.date, d("2024-02-10"));
        assert!(tenth.logged);
        assert!(!tenth.all_complete);
        assert!(!summary[0].logged);

        assert_eq!(store.month_logs(d("2024-02-01")).unwrap().len(), 1);
        assert_eq!(store.week_summary(d("2024-02-10")).unwrap().len(), 7);
        assert_eq!(store.week_logs(d("2024-02-10")).unwrap().len(), 1);
    }
}
