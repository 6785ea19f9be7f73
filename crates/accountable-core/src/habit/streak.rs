//! Streak computation.
//!
//! The overall streak counts consecutive days, walking back from today, on
//! which every configured cluster was complete. A day without a log ends the
//! streak, so an empty day and a day the tracker was never opened look the
//! same. Streaks are always recomputed from stored logs.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::cluster::{self, Cluster};
use super::log::HabitLog;
use crate::error::StorageError;
use crate::storage::{HabitRepository, StreakTierConfig};

/// Default cap on how far back a streak scan walks.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 365;

/// Largest lookback any scan honours; larger requests are clamped.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// `today - offset`, or `None` before the earliest representable date.
fn days_before(today: NaiveDate, offset: u32) -> Option<NaiveDate> {
    today.checked_sub_days(Days::new(u64::from(offset)))
}

/// First day of a scan of `lookback_days` ending at `today`, and the
/// number of days actually available in that scan.
fn scan_window(today: NaiveDate, lookback_days: u32) -> (NaiveDate, u32) {
    let lookback = lookback_days.clamp(1, MAX_LOOKBACK_DAYS);
    match days_before(today, lookback - 1) {
        Some(start) => (start, lookback),
        None => {
            let available = (today - NaiveDate::MIN).num_days() + 1;
            (NaiveDate::MIN, u32::try_from(available).unwrap_or(lookback).min(lookback))
        }
    }
}

/// Badge level for a streak length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakTier {
    None,
    Bronze,
    Silver,
    Gold,
    Legendary,
}

impl StreakTier {
    pub fn for_days(days: u32, thresholds: &StreakTierConfig) -> Self {
        if days >= thresholds.legendary {
            StreakTier::Legendary
        } else if days >= thresholds.gold {
            StreakTier::Gold
        } else if days >= thresholds.silver {
            StreakTier::Silver
        } else if days >= thresholds.bronze {
            StreakTier::Bronze
        } else {
            StreakTier::None
        }
    }
}

/// Streak figures for a single cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStreak {
    pub cluster_id: String,
    /// Run ending today, or ending yesterday while today is still open.
    pub current_streak: u32,
    /// Longest run inside the lookback window.
    pub longest_streak: u32,
    pub last_completed: Option<NaiveDate>,
    pub tier: StreakTier,
}

/// Overall and per-cluster streaks as of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakReport {
    pub as_of: NaiveDate,
    pub streak: u32,
    pub tier: StreakTier,
    pub clusters: Vec<ClusterStreak>,
}

/// Consecutive all-clusters-complete days ending at `today`.
///
/// Stops at the first missing or failing day, or after `lookback_days`
/// days (clamped to [`MAX_LOOKBACK_DAYS`]).
///
/// # Errors
/// Propagates repository read failures.
pub fn calculate_streak<R: HabitRepository + ?Sized>(
    repo: &R,
    clusters: &[Cluster],
    today: NaiveDate,
    lookback_days: u32,
) -> Result<u32, StorageError> {
    if lookback_days == 0 {
        return Ok(0);
    }
    let (start, window) = scan_window(today, lookback_days);
    let logs = logs_by_date(repo, start, today)?;

    let mut streak = 0;
    for offset in 0..window {
        let Some(log) = days_before(today, offset).and_then(|date| logs.get(&date)) else {
            break;
        };
        if !cluster::all_complete(clusters, &log.completed_ids()) {
            break;
        }
        streak += 1;
    }
    Ok(streak)
}

fn logs_by_date<R: HabitRepository + ?Sized>(
    repo: &R,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BTreeMap<NaiveDate, HabitLog>, StorageError> {
    Ok(repo
        .get_date_range(start, end)?
        .into_iter()
        .map(|log| (log.date, log))
        .collect())
}

/// Per-cluster streaks over the `lookback_days` ending at `today`
/// (clamped to [`MAX_LOOKBACK_DAYS`]).
///
/// # Errors
/// Propagates repository read failures.
pub fn cluster_streaks<R: HabitRepository + ?Sized>(
    repo: &R,
    clusters: &[Cluster],
    today: NaiveDate,
    lookback_days: u32,
    thresholds: &StreakTierConfig,
) -> Result<Vec<ClusterStreak>, StorageError> {
    if lookback_days == 0 {
        return Ok(clusters
            .iter()
            .map(|c| ClusterStreak {
                cluster_id: c.id.clone(),
                current_streak: 0,
                longest_streak: 0,
                last_completed: None,
                tier: StreakTier::None,
            })
            .collect());
    }

    let (start, window) = scan_window(today, lookback_days);
    let logs = logs_by_date(repo, start, today)?;

    Ok(clusters
        .iter()
        .map(|c| streak_for_cluster(c, &logs, today, window, thresholds))
        .collect())
}

fn streak_for_cluster(
    cluster: &Cluster,
    logs: &BTreeMap<NaiveDate, HabitLog>,
    today: NaiveDate,
    window: u32,
    thresholds: &StreakTierConfig,
) -> ClusterStreak {
    // Newest first: qualified[i] is today - i.
    let qualified: Vec<bool> = (0..window)
        .map(|offset| {
            days_before(today, offset)
                .and_then(|date| logs.get(&date))
                .is_some_and(|log| cluster::is_complete(cluster, &log.completed_ids()))
        })
        .collect();

    let run_from = |start: usize| -> u32 {
        qualified
            .iter()
            .skip(start)
            .take_while(|q| **q)
            .count() as u32
    };
    let current_streak = if qualified[0] { run_from(0) } else { run_from(1) };

    let mut longest_streak = 0;
    let mut run = 0;
    for q in &qualified {
        run = if *q { run + 1 } else { 0 };
        longest_streak = longest_streak.max(run);
    }

    let last_completed = qualified
        .iter()
        .position(|q| *q)
        .and_then(|offset| days_before(today, offset as u32));

    ClusterStreak {
        cluster_id: cluster.id.clone(),
        current_streak,
        longest_streak,
        last_completed,
        tier: StreakTier::for_days(current_streak, thresholds),
    }
}
