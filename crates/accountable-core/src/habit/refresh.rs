//! Debounce for streak recomputation.
//!
//! Callers request a refresh whenever the viewed day changes. Requests
//! inside the debounce interval collapse into one, and a request whose key
//! (date plus completed set) matches the last computed key is dropped.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::log::date_key;

#[derive(Debug, Clone)]
pub struct StreakRefresh {
    interval: Duration,
    pending: Option<(String, DateTime<Utc>)>,
    last_computed: Option<String>,
}

impl StreakRefresh {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            // capped at one day
            interval: Duration::milliseconds(interval_ms.min(86_400_000) as i64),
            pending: None,
            last_computed: None,
        }
    }

    /// Key identifying the input a streak was computed from.
    pub fn key_for(date: NaiveDate, completed: &BTreeSet<String>) -> String {
        let ids: Vec<&str> = completed.iter().map(String::as_str).collect();
        format!("{}-{}", date_key(date), ids.join(","))
    }

    /// Schedule a refresh for `key`, pushing the deadline out by one interval.
    ///
    /// Returns `false` when `key` was already computed and nothing is queued.
    pub fn request(&mut self, key: String, now: DateTime<Utc>) -> bool {
        if self.last_computed.as_deref() == Some(key.as_str()) {
            self.pending = None;
            return false;
        }
        self.pending = Some((key, now + self.interval));
        true
    }

    /// Take the pending key once its deadline has passed.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<String> {
        match &self.pending {
            Some((_, due)) if *due <= now => self.pending.take().map(|(key, _)| key),
            _ => None,
        }
    }

    /// Record that `key` has been computed.
    pub fn mark_computed(&mut self, key: String) {
        self.last_computed = Some(key);
    }

    /// Take the pending key without waiting for its deadline.
    pub fn take_pending(&mut self) -> Option<String> {
        self.pending.take().map(|(key, _)| key)
    }
}
