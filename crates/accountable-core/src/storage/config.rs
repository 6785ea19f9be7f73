//! TOML-based application configuration.
//!
//! Stores:
//! - Edit window and streak lookback
//! - Storage backend and namespace key
//! - Streak tier thresholds
//! - Cluster definitions
//!
//! Configuration is stored at `~/.config/accountable/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::repository::DEFAULT_NAMESPACE;
use super::{data_dir, is_valid_key};
use crate::error::ConfigError;
use crate::habit::cluster::{default_clusters, validate_clusters, Cluster};
use crate::habit::streak::MAX_LOOKBACK_DAYS;

/// Tracker policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Days (inclusive of today) during which a log may still change.
    #[serde(default = "default_edit_window_days")]
    pub edit_window_days: u32,
    /// Maximum days walked back when computing streaks.
    #[serde(default = "default_streak_lookback_days")]
    pub streak_lookback_days: u32,
    /// Debounce interval for streak recomputation requests.
    #[serde(default = "default_streak_refresh_ms")]
    pub streak_refresh_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Json,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// Minimum streak lengths for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakTierConfig {
    #[serde(default = "default_bronze")]
    pub bronze: u32,
    #[serde(default = "default_silver")]
    pub silver: u32,
    #[serde(default = "default_gold")]
    pub gold: u32,
    #[serde(default = "default_legendary")]
    pub legendary: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/accountable/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub streak_tiers: StreakTierConfig,
    #[serde(default = "default_clusters")]
    pub clusters: Vec<Cluster>,
}

fn default_edit_window_days() -> u32 {
    7
}
fn default_streak_lookback_days() -> u32 {
    365
}
fn default_streak_refresh_ms() -> u64 {
    1000
}
fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}
fn default_bronze() -> u32 {
    3
}
fn default_silver() -> u32 {
    7
}
fn default_gold() -> u32 {
    30
}
fn default_legendary() -> u32 {
    100
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            edit_window_days: default_edit_window_days(),
            streak_lookback_days: default_streak_lookback_days(),
            streak_refresh_ms: default_streak_refresh_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            namespace: default_namespace(),
        }
    }
}

impl Default for StreakTierConfig {
    fn default() -> Self {
        Self {
            bronze: default_bronze(),
            silver: default_silver(),
            gold: default_gold(),
            legendary: default_legendary(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            storage: StorageConfig::default(),
            streak_tiers: StreakTierConfig::default(),
            clusters: default_clusters(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Path of `config.toml` in the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed or fails
    /// validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracker.edit_window_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tracker.edit_window_days".into(),
                message: "must be at least 1".into(),
            });
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.tracker.streak_lookback_days) {
            return Err(ConfigError::InvalidValue {
                key: "tracker.streak_lookback_days".into(),
                message: format!("must be between 1 and {MAX_LOOKBACK_DAYS}"),
            });
        }
        let t = &self.streak_tiers;
        if !(t.bronze <= t.silver && t.silver <= t.gold && t.gold <= t.legendary) {
            return Err(ConfigError::InvalidValue {
                key: "streak_tiers".into(),
                message: "thresholds must be non-decreasing".into(),
            });
        }
        if !is_valid_key(&self.storage.namespace) {
            return Err(ConfigError::InvalidValue {
                key: "storage.namespace".into(),
                message: "must be non-empty ASCII letters, digits, '-' or '_'".into(),
            });
        }
        validate_clusters(&self.clusters).map_err(|e| ConfigError::InvalidValue {
            key: "clusters".into(),
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the result fails validation. `self` is unchanged on error.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Set a value by dot-separated key and save.
    ///
    /// # Errors
    /// See [`Config::apply`]; also fails if the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Cluster that owns `habit_id`, if any.
    pub fn cluster_for_habit(&self, habit_id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.contains(habit_id))
    }
}
