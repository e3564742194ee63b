//! String-valued local state
//!
//! A small key-value abstraction used for the draft cache and saved
//! credentials. `FileStore` keeps every key in one JSON object on disk;
//! `MemoryStore` is the in-process variant used by tests and by callers that
//! opt out of persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, StorageError};

/// Key used for the saved handle
pub const HANDLE_KEY: &str = "bluesky_handle";
/// Key used for the saved app password
pub const APP_PASSWORD_KEY: &str = "bluesky_app_password";
/// Key used for the JSON-encoded draft array
pub const DRAFTS_KEY: &str = "bluesky_thread_drafts";

/// Backend for persisted local state
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// JSON-file backed store
///
/// The file holds a flat `{"key": "value"}` object. Writes go to a sibling
/// temp file that is renamed into place, and the file is created with mode
/// 600 on Unix because it may hold an app password.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let metadata = std::fs::symlink_metadata(&self.path).map_err(StorageError::Io)?;
        if metadata.is_symlink() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "State file '{}' is a symbolic link; refusing to use it",
                    self.path.display()
                ),
            ))
            .into());
        }

        let content = std::fs::read_to_string(&self.path).map_err(StorageError::Io)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let entries = serde_json::from_str(&content).map_err(StorageError::Serialization)?;
        Ok(entries)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }

        let content = serde_json::to_string_pretty(entries).map_err(StorageError::Serialization)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(StorageError::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp_path, perms).map_err(StorageError::Io)?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(StorageError::Io)?;
        Ok(())
    }

    // A corrupt state file is replaced rather than blocking every write
    fn entries_for_update(&self) -> Result<BTreeMap<String, String>> {
        match self.read_entries() {
            Ok(entries) => Ok(entries),
            Err(crate::ThreadpostError::Storage(StorageError::Serialization(e))) => {
                tracing::warn!(
                    "State file {} is corrupt ({}), starting fresh",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.entries_for_update()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)?;
        tracing::debug!("Stored '{}' in {}", key, self.path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.entries_for_update()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
            tracing::debug!("Removed '{}' from {}", key, self.path.display());
        }
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}
