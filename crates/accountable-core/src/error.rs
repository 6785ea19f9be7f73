//! Core error types for accountable-core.
//!
//! This module defines the error hierarchy using thiserror. Storage failures
//! surface as [`StorageError`], edit-window rejections as
//! [`CoreError::EditWindowViolation`], and malformed persisted records are
//! never surfaced at all (they are skipped and logged).

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Core error type for accountable-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence layer could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The date is outside the trailing edit window
    #[error("{date} is not editable: only the last {window_days} days can be changed")]
    EditWindowViolation { date: NaiveDate, window_days: u32 },

    /// A mutation was requested before any date was loaded
    #[error("No date loaded; call load_date first")]
    NoDateLoaded,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Storage(e) => e.is_retryable(),
            CoreError::Io(_) => true,
            _ => false,
        }
    }
}

/// Persistence-specific errors (the store is unavailable).
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,

    /// Reading or writing a backing file failed
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Log set could not be encoded for writing
    #[error("Failed to encode logs: {0}")]
    Encode(#[from] serde_json::Error),

    /// An internal lock was poisoned by a panicking writer
    #[error("Storage lock poisoned")]
    Poisoned,

    /// Key contains characters the backend cannot store verbatim
    #[error("Invalid storage key {0:?}: only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidKey(String),
}

impl StorageError {
    /// Transient failures that a caller may retry once before surfacing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Locked | StorageError::Io { .. })
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Date string is not a zero-padded `YYYY-MM-DD`
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Month string is not `YYYY-MM`
    #[error("Invalid month '{0}': expected YYYY-MM")]
    InvalidMonth(String),

    /// Range end precedes its start
    #[error("Invalid date range: end ({end}) is before start ({start})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Cluster quota cannot be met by its own habits
    #[error("Cluster '{cluster}' requires {required} habits but only has {available}")]
    QuotaTooLarge {
        cluster: String,
        required: usize,
        available: usize,
    },

    /// Two clusters share an id
    #[error("Duplicate cluster id '{0}'")]
    DuplicateCluster(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StorageError::Locked
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StorageError::Poisoned
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
