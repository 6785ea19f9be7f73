//! Daily habit logs and date keys.
//!
//! A [`HabitLog`] is one calendar day's record. Its JSON shape is
//! `{ "date": "YYYY-MM-DD", "habits": { "<habit id>": true|false } }`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Storage format of a date key.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One calendar day's completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitLog {
    pub date: NaiveDate,
    #[serde(default)]
    pub habits: BTreeMap<String, bool>,
}

impl HabitLog {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            habits: BTreeMap::new(),
        }
    }

    /// Ids whose flag is `true`. Explicit `false` entries are excluded.
    pub fn completed_ids(&self) -> BTreeSet<String> {
        self.habits
            .iter()
            .filter(|(_, done)| **done)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_complete(&self, habit_id: &str) -> bool {
        self.habits.get(habit_id).copied().unwrap_or(false)
    }
}

/// Format a date as its storage key.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a zero-padded `YYYY-MM-DD` key.
///
/// Unpadded forms such as `2024-6-1` are rejected: lexicographic order of
/// keys only matches chronological order when every key is padded.
pub fn parse_date_key(s: &str) -> Result<NaiveDate, ValidationError> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(ValidationError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

/// Parse `YYYY-MM` into the first and last day of that month.
pub fn parse_month(s: &str) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let first = parse_date_key(&format!("{s}-01"))
        .map_err(|_| ValidationError::InvalidMonth(s.to_string()))?;
    Ok(month_bounds(first))
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    (first, last)
}

/// Monday-to-Sunday week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = date.weekday().num_days_from_monday() as i64;
    let start = date - Duration::days(offset);
    (start, start + Duration::days(6))
}
