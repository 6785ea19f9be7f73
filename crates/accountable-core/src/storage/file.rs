//! Directory-backed key-value store.
//!
//! Each key is stored as `<dir>/<key>.json`. Writes go to a sibling temp
//! file that is then renamed over the target, so a crash mid-write leaves
//! the previous value intact. [`KeyValueStore::update`] holds an exclusive
//! lock on `<dir>/<key>.lock` so concurrent processes serialize.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::{is_valid_key, KeyValueStore};
use crate::error::StorageError;

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create) the directory backing the store.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys map one-to-one onto file names, so anything that would need
    /// rewriting is rejected instead.
    fn key_path(&self, key: &str, extension: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{extension}")))
    }

    fn write_path(path: &Path, value: &str) -> Result<(), StorageError> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key, "json")?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key, "json")?;
        Self::write_path(&path, value)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        let lock_path = self.key_path(key, "lock")?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StorageError::Io {
                path: lock_path.clone(),
                source,
            })?;
        lock.lock_exclusive().map_err(|source| StorageError::Io {
            path: lock_path.clone(),
            source,
        })?;

        let result = self
            .read(key)
            .and_then(|current| apply(current))
            .and_then(|next| self.write(key, &next));

        if let Err(e) = lock.unlock() {
            tracing::warn!(path = %lock_path.display(), error = %e, "failed to release store lock");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("logs")).unwrap();
        assert_eq!(store.read("habit-tracker-logs").unwrap(), None);
        store.write("habit-tracker-logs", "{}").unwrap();

        let reopened = FileStore::open(dir.path().join("logs")).unwrap();
        assert_eq!(
            reopened.read("habit-tracker-logs").unwrap().as_deref(),
            Some("{}")
        );
        assert!(reopened.dir().join("habit-tracker-logs.json").exists());
        assert!(!reopened.dir().join("habit-tracker-logs.json.tmp").exists());
    }

    #[test]
    fn keys_that_would_need_rewriting_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for key in ["../outside", "a.b", "a/b", ""] {
            assert!(matches!(
                store.write(key, "x"),
                Err(StorageError::InvalidKey(_))
            ));
            assert!(matches!(store.read(key), Err(StorageError::InvalidKey(_))));
        }
        store.write("a_b", "x").unwrap();
        assert_eq!(store.read("a_b").unwrap().as_deref(), Some("x"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn update_sees_writes_from_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileStore::open(dir.path()).unwrap();
        let b = FileStore::open(dir.path()).unwrap();
        a.write("k", "1").unwrap();
        b.update("k", &mut |current| Ok(format!("{}2", current.unwrap_or_default())))
            .unwrap();
        a.update("k", &mut |current| Ok(format!("{}3", current.unwrap_or_default())))
            .unwrap();
        assert_eq!(b.read("k").unwrap().as_deref(), Some("123"));
    }
}
