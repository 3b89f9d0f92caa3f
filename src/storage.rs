// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Key-value persistence shim.
//!
//! Quotebook persists everything it knows through a tiny key-value interface
//! where each value is a JSON document. The quote store, the last viewed quote,
//! the conflict history, and the chosen conflict policy each live under their
//! own key, so they can be read and written independently of one another.
//!
//! # Backends
//!
//! - [`FileStorage`] keeps one `<key>.json` file per key inside a data
//!   directory. Writes go to a temporary file first and are then renamed into
//!   place, so a crash never leaves a half written document behind.
//! - [`MemoryStorage`] keeps everything in a map, and is mostly useful for
//!   testing.

use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{debug, instrument};

/// Storage key of the persisted quote list.
pub const QUOTES_KEY: &str = "quotes";

/// Storage key of the last viewed quote.
pub const LAST_VIEWED_KEY: &str = "last_viewed";

/// Storage key of the last chosen category filter.
pub const CATEGORY_FILTER_KEY: &str = "category_filter";

/// Storage key of the bounded conflict history.
pub const CONFLICT_HISTORY_KEY: &str = "conflict_history";

/// Storage key of the chosen conflict policy.
pub const CONFLICT_POLICY_KEY: &str = "conflict_policy";

/// Storage key of queued changes waiting to be pushed to the remote.
pub const PENDING_CHANGES_KEY: &str = "pending_changes";

/// Storage key of sync bookkeeping.
pub const SYNC_STATE_KEY: &str = "sync_state";

/// Layer of indirection for raw value persistence.
pub trait KeyValue {
    /// Read value stored under key, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store value under key, replacing whatever was there.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove value stored under key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and deserialize JSON document stored under key.
///
/// # Errors
///
/// - Return [`StorageError::Io`] if backend fails to read.
/// - Return [`StorageError::Json`] if stored document is malformed.
pub fn read_json<T>(storage: &impl KeyValue, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match storage.get(key)? {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

/// Serialize and store JSON document under key.
///
/// # Errors
///
/// - Return [`StorageError::Io`] if backend fails to write.
/// - Return [`StorageError::Json`] if value cannot be serialized.
pub fn write_json<T>(storage: &impl KeyValue, key: &str, value: &T) -> Result<()>
where
    T: Serialize,
{
    storage.set(key, &serde_json::to_string(value)?)
}

/// Directory backed storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open storage at target directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// - Return [`StorageError::Io`] if directory cannot be created.
    #[instrument(skip(root), level = "debug")]
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        debug!("open file storage at {}", root.display());
        fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    /// Directory this storage writes into.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValue for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        let staging = self.root.join(format!(".{key}.json.tmp"));

        // INVARIANT: Never expose partially written documents.
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // INVARIANT: Every write is a single insert or remove.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValue for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.into(), value.into());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

impl<T> KeyValue for &T
where
    T: KeyValue + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Storage error types.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend failed to read or write.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = StorageError> = std::result::Result<T, E>;
