mod config;
pub mod file;
pub mod memory;
pub mod migrations;
pub mod repository;
pub mod sqlite;

pub use config::{Config, StorageBackend, StorageConfig, StreakTierConfig, TrackerConfig};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use repository::{HabitRepository, LogRepository};
pub use sqlite::SqliteStore;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ConfigError, StorageError};

/// Host key-value store the log repository persists into.
///
/// Values are opaque text; a missing key reads as `None`.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read-modify-write of one key.
    ///
    /// `apply` receives the current value and returns the replacement. The
    /// default reads then writes; backends shared between processes override
    /// it so no other writer can interleave.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        let next = apply(self.read(key)?)?;
        self.write(key, &next)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        (**self).update(key, apply)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        (**self).update(key, apply)
    }
}

/// Whether `key` is usable verbatim by every backend: non-empty ASCII
/// letters, digits, `-` and `_`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Returns the data directory, creating it if needed.
///
/// `ACCOUNTABLE_DATA_DIR` wins when set. Otherwise `~/.config/accountable/`,
/// or `~/.config/accountable-dev/` when `ACCOUNTABLE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("ACCOUNTABLE_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env =
                std::env::var("ACCOUNTABLE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("accountable-dev")
            } else {
                base_dir.join("accountable")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Open the key-value store selected by `config.storage.backend`.
///
/// # Errors
/// Returns an error if the data directory or database cannot be opened.
pub fn open_store(config: &Config) -> crate::Result<Box<dyn KeyValueStore>> {
    let store: Box<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Memory => Box::new(MemoryStore::new()),
        StorageBackend::Json => Box::new(FileStore::open(data_dir()?.join("logs"))?),
        StorageBackend::Sqlite => Box::new(SqliteStore::open(data_dir()?.join("accountable.db"))?),
    };
    Ok(store)
}

/// Open the configured store and load the log repository from it.
///
/// # Errors
/// Returns an error if the store cannot be opened or read.
pub fn open_repository(config: &Config) -> crate::Result<LogRepository<Box<dyn KeyValueStore>>> {
    let store = open_store(config)?;
    Ok(LogRepository::open(store, config.storage.namespace.clone())?)
}
