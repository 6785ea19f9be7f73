//! Habit log repository.
//!
//! All logs live under one namespace key as a JSON object mapping date keys
//! to [`HabitLog`] records. Nothing is cached: reads decode the current blob,
//! and every mutation is one [`KeyValueStore::update`] that re-reads, changes
//! a single date and writes the set back before the call returns. Records
//! that fail to decode are carried through writes unchanged.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use super::KeyValueStore;
use crate::error::StorageError;
use crate::habit::log::{date_key, parse_date_key, HabitLog};

/// Namespace key used by the reference web client.
pub const DEFAULT_NAMESPACE: &str = "habit-tracker-logs";

/// Persistence operations the habit store depends on.
pub trait HabitRepository: Send + Sync {
    /// Ensure a log exists for `date` and set `habit_id` to `true`.
    fn mark_complete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError>;

    /// Ensure a log exists for `date` and set `habit_id` to `false`.
    /// The key is kept so "unmarked" stays distinct from "never recorded".
    fn mark_incomplete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError>;

    /// Flag for `habit_id` on `date`; `false` when either is absent.
    fn is_complete(&self, habit_id: &str, date: NaiveDate) -> Result<bool, StorageError> {
        Ok(self
            .get_log(date)?
            .is_some_and(|log| log.is_complete(habit_id)))
    }

    /// Log for `date`, without creating one.
    fn get_log(&self, date: NaiveDate) -> Result<Option<HabitLog>, StorageError>;

    /// Logs with `start <= date <= end`, oldest first. Empty when `start > end`.
    fn get_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HabitLog>, StorageError>;
}

impl<T: HabitRepository + ?Sized> HabitRepository for Arc<T> {
    fn mark_complete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError> {
        (**self).mark_complete(habit_id, date)
    }

    fn mark_incomplete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError> {
        (**self).mark_incomplete(habit_id, date)
    }

    fn is_complete(&self, habit_id: &str, date: NaiveDate) -> Result<bool, StorageError> {
        (**self).is_complete(habit_id, date)
    }

    fn get_log(&self, date: NaiveDate) -> Result<Option<HabitLog>, StorageError> {
        (**self).get_log(date)
    }

    fn get_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HabitLog>, StorageError> {
        (**self).get_date_range(start, end)
    }
}

/// [`HabitRepository`] over a [`KeyValueStore`].
pub struct LogRepository<S: KeyValueStore> {
    store: S,
    namespace: String,
    skipped: AtomicUsize,
}

impl<S: KeyValueStore> LogRepository<S> {
    /// Open the log set stored under `namespace`.
    ///
    /// A blob that is not a JSON object, and individual records that do not
    /// decode, are reported with a warning rather than failing the open.
    ///
    /// # Errors
    /// Returns an error only if the store itself cannot be read.
    pub fn open(store: S, namespace: impl Into<String>) -> Result<Self, StorageError> {
        let repo = Self {
            store,
            namespace: namespace.into(),
            skipped: AtomicUsize::new(0),
        };
        let decoded = repo.load()?;
        if decoded.skipped() > 0 {
            tracing::warn!(
                namespace = %repo.namespace,
                skipped = decoded.skipped(),
                "stored habit logs contain unreadable records; they are kept but ignored"
            );
        }
        tracing::debug!(namespace = %repo.namespace, logs = decoded.logs.len(), "loaded habit logs");
        Ok(repo)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key that receives the raw blob before a write would drop unreadable data.
    pub fn backup_key(&self) -> String {
        format!("{}-corrupt", self.namespace)
    }

    /// Number of malformed records seen by the most recent read.
    pub fn skipped_records(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.load()?.logs.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.load()?.logs.is_empty())
    }

    /// Decode the current blob. Every read goes to the store so writes from
    /// other handles are always visible.
    fn load(&self) -> Result<DecodedLogs, StorageError> {
        let decoded = match self.store.read(&self.namespace)? {
            Some(text) => decode_logs(&text),
            None => DecodedLogs::default(),
        };
        self.skipped.store(decoded.skipped(), Ordering::Relaxed);
        Ok(decoded)
    }

    /// Copy the raw blob to [`Self::backup_key`] when writing `date` would
    /// drop something that could not be decoded.
    fn preserve_unreadable(&self, date: NaiveDate) -> Result<(), StorageError> {
        let Some(text) = self.store.read(&self.namespace)? else {
            return Ok(());
        };
        let decoded = decode_logs(&text);
        if !decoded.corrupt && !decoded.unreadable.contains_key(&date_key(date)) {
            return Ok(());
        }

        let backup = self.backup_key();
        if self.store.read(&backup)?.as_deref() == Some(text.as_str()) {
            return Ok(());
        }
        self.store.write(&backup, &text)?;
        tracing::warn!(
            namespace = %self.namespace,
            backup = %backup,
            "saved unreadable habit logs before overwriting them"
        );
        Ok(())
    }

    fn set_flag(&self, habit_id: &str, date: NaiveDate, value: bool) -> Result<(), StorageError> {
        self.preserve_unreadable(date)?;

        self.store.update(&self.namespace, &mut |current| {
            let mut decoded = current.as_deref().map(decode_logs).unwrap_or_default();
            decoded.unreadable.remove(&date_key(date));
            decoded
                .logs
                .entry(date)
                .or_insert_with(|| HabitLog::new(date))
                .habits
                .insert(habit_id.to_string(), value);
            encode_logs(&decoded)
        })?;

        tracing::debug!(habit = habit_id, date = %date, value, "persisted habit flag");
        Ok(())
    }
}

impl<S: KeyValueStore> HabitRepository for LogRepository<S> {
    fn mark_complete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError> {
        self.set_flag(habit_id, date, true)
    }

    fn mark_incomplete(&self, habit_id: &str, date: NaiveDate) -> Result<(), StorageError> {
        self.set_flag(habit_id, date, false)
    }

    fn get_log(&self, date: NaiveDate) -> Result<Option<HabitLog>, StorageError> {
        Ok(self.load()?.logs.remove(&date))
    }

    fn get_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HabitLog>, StorageError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .load()?
            .logs
            .range(start..=end)
            .map(|(_, log)| log.clone())
            .collect())
    }
}

/// A decoded namespace blob.
#[derive(Debug, Default)]
struct DecodedLogs {
    logs: BTreeMap<NaiveDate, HabitLog>,
    /// Entries that did not decode, carried through writes untouched.
    unreadable: serde_json::Map<String, serde_json::Value>,
    /// The blob itself was not a JSON object.
    corrupt: bool,
}

impl DecodedLogs {
    fn skipped(&self) -> usize {
        self.unreadable.len() + usize::from(self.corrupt)
    }
}

fn encode_logs(decoded: &DecodedLogs) -> Result<String, StorageError> {
    let mut entries = decoded.unreadable.clone();
    for (date, log) in &decoded.logs {
        entries.insert(date_key(*date), serde_json::to_value(log)?);
    }
    Ok(serde_json::to_string(&entries)?)
}

fn decode_logs(text: &str) -> DecodedLogs {
    let Ok(entries) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(text)
    else {
        return DecodedLogs {
            corrupt: true,
            ..DecodedLogs::default()
        };
    };

    let mut decoded = DecodedLogs::default();
    for (key, value) in entries {
        let log = parse_date_key(&key)
            .ok()
            .zip(serde_json::from_value::<HabitLog>(value.clone()).ok());
        match log {
            // The map key is authoritative; a mismatched inner date is corrected.
            Some((date, mut log)) => {
                log.date = date;
                decoded.logs.insert(date, log);
            }
            None => {
                decoded.unreadable.insert(key, value);
            }
        }
    }
    decoded
}
