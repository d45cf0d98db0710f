//! Local fallback store
//!
//! A string-keyed blob store backed by a single JSON file, used when no
//! authenticated owner exists. Holds the anonymous program snapshot, the
//! last-completed pointer for undo, and the one-shot migration marker.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Anonymous program snapshot (completions + cycle number).
pub const PROGRESS_KEY: &str = "workoutProgress";
/// Pointer to the most recent completion, kept for the undo window.
pub const LAST_COMPLETED_KEY: &str = "lastCompletedWorkout";
/// Set once the local snapshot has been migrated into the remote store.
pub const MIGRATED_KEY: &str = "workoutProgressMigrated";

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("Local store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local store contains invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed key/value store with whole-file writes on every mutation.
///
/// Mirrors the single-writer, synchronous semantics of browser local
/// storage; values are opaque strings (callers serialize their own JSON).
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LocalStore {
    /// Open a store at the given path, creating parent directories.
    /// A missing file is an empty store, not an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    /// Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &str) -> Result<(), LocalStoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), LocalStoreError> {
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open(dir.path().join("local.json")).expect("open store");
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let (_dir, store) = temp_store();
        assert!(store.get(PROGRESS_KEY).is_none());
    }

    #[test]
    fn test_set_get_roundtrip_survives_reopen() {
        let (_dir, mut store) = temp_store();
        store.set(PROGRESS_KEY, r#"{"cycle":2}"#).unwrap();
        assert_eq!(store.get(PROGRESS_KEY), Some(r#"{"cycle":2}"#));

        let reopened = LocalStore::open(store.path().to_path_buf()).unwrap();
        assert_eq!(reopened.get(PROGRESS_KEY), Some(r#"{"cycle":2}"#));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_dir, mut store) = temp_store();
        store.set(MIGRATED_KEY, "true").unwrap();
        store.remove(MIGRATED_KEY).unwrap();
        assert!(store.get(MIGRATED_KEY).is_none());
        // Second remove of the same key succeeds.
        store.remove(MIGRATED_KEY).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(LocalStore::open(path).is_err());
    }
}
