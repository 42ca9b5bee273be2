//! Local key-value slot abstraction.
//!
//! Models the durable, process-external string slot a client keeps its
//! offline state in. Callers receive the store by injection so that tests
//! can substitute [`MemoryKeyValueStore`] for the file-backed store.
//!
//! The contract is deliberately small:
//! - `get` returns `None` for absent keys (never `Error::NotFound`)
//! - `set` replaces the whole value
//! - `remove` is idempotent
//!
//! Read-modify-write sequences built on top of this trait are not atomic
//! across processes; the last writer wins.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// A durable string slot keyed by name.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage is unavailable.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage is unavailable or full.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Succeeds if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage is unavailable.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
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

/// In-memory key-value store for testing.
///
/// Thread-safe via `RwLock`. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Returns true if no keys are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, String>>> {
        self.entries.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.entries.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }
}

/// File-backed key-value store: one file per key inside a directory.
///
/// Keys are percent-encoded into file names, so any key string is valid.
/// Writes go to a uniquely named temporary sibling first and are renamed
/// into place, so a crash mid-write leaves either the old or the new value
/// and concurrent writers to one key never share a staging file.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            Error::storage_with_source(format!("create {}", root.display()), e)
        })?;
        Ok(Self { root })
    }

    /// Returns the directory holding the entries.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage_with_source(
                format!("read {}", path.display()),
                e,
            )),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        write_atomic(&self.path_for(key), value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_with_source(
                format!("remove {}", path.display()),
                e,
            )),
        }
    }
}

/// Replaces `path` with `content` through a temporary file in the same
/// directory.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
        Error::storage_with_source(format!("create temp file in {}", parent.display()), e)
    })?;
    staged
        .write_all(content.as_bytes())
        .map_err(|e| Error::storage_with_source(format!("write {}", path.display()), e))?;
    staged
        .persist(path)
        .map_err(|e| Error::storage_with_source(format!("persist {}", path.display()), e))?;
    Ok(())
}

/// Percent-encodes everything outside `[A-Za-z0-9_-]`.
///
/// `.` is encoded too, so no key can collide with the `.tmp*` staging files.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
