//! JSON-file store.
//!
//! The whole file is one flat JSON object of qualified keys to raw strings.
//! Writes go to a sibling temp file that is renamed over the original, with
//! 0600 permissions on unix, so a crash never leaves a half-written session.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{KeyValueStore, namespaced};
use crate::error::StorageError;

type Entries = BTreeMap<String, String>;

#[derive(Debug)]
pub struct FileStore {
    namespace: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), path: path.into(), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.display_path(), source }
    }

    fn load(&self) -> Result<Entries, StorageError> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if contents.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| StorageError::Corrupt { path: self.display_path(), reason: e.to_string() })
    }

    /// Load for a read-modify-write. A corrupt file is discarded so purges
    /// and fresh writes can still proceed.
    fn load_for_write(&self) -> Result<Entries, StorageError> {
        match self.load() {
            Ok(entries) => Ok(entries),
            Err(StorageError::Corrupt { path, reason }) => {
                tracing::warn!(%path, %reason, "discarding corrupt session file");
                Ok(Entries::new())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|source| StorageError::Serde { key: "*".into(), source })?;
        let tmp = self.path.with_extension("json.tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp).map_err(|e| self.io_error(e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn modify(&self, f: impl FnOnce(&mut Entries)) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut entries = self.load_for_write()?;
        f(&mut entries);
        self.save(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.load()?;
        Ok(entries.get(&namespaced(&self.namespace, key)).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let qualified = namespaced(&self.namespace, key);
        self.modify(|entries| {
            entries.insert(qualified, value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let qualified = namespaced(&self.namespace, key);
        self.modify(|entries| {
            entries.remove(&qualified);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        let prefix = namespaced(&self.namespace, "");
        self.modify(|entries| entries.retain(|k, _| !k.starts_with(&prefix)))
    }
}
