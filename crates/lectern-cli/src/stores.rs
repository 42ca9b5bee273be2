//! Store wiring for CLI commands.
//!
//! The local slot is a [`FileKeyValueStore`] under `<data-dir>/local`; the
//! remote is a [`FileDocumentStore`] snapshot at `<data-dir>/remote.json`,
//! standing in for the hosted document database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use lectern_core::{FileDocumentStore, FileKeyValueStore};
use lectern_progress::{PendingStore, ProgressRecorder, SyncReconciler};
use tracing::debug;

use crate::Config;

/// Local slot shared by the queue and the progress cache.
pub type LocalStore = Arc<FileKeyValueStore>;

/// Remote document store.
pub type RemoteStore = Arc<FileDocumentStore>;

/// Opened local and remote stores.
#[derive(Debug, Clone)]
pub struct Stores {
    local: LocalStore,
    remote: RemoteStore,
    config: Config,
}

impl Stores {
    /// Opens both stores under the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the local directory cannot be created or the
    /// remote snapshot exists but cannot be read.
    pub fn open(config: &Config) -> Result<Self> {
        let local_dir = config.data_dir.join("local");
        let local = FileKeyValueStore::open(&local_dir)
            .with_context(|| format!("Failed to open local store at {}", local_dir.display()))?;

        let remote_path = Self::remote_path(config);
        let remote = FileDocumentStore::open(&remote_path)
            .with_context(|| format!("Failed to open remote store at {}", remote_path.display()))?;

        debug!(
            local = %local_dir.display(),
            remote = %remote_path.display(),
            "opened stores"
        );
        Ok(Self {
            local: Arc::new(local),
            remote: Arc::new(remote),
            config: config.clone(),
        })
    }

    /// Location of the remote snapshot.
    #[must_use]
    pub fn remote_path(config: &Config) -> PathBuf {
        config.data_dir.join("remote.json")
    }

    /// Returns the pending queue.
    #[must_use]
    pub fn pending(&self) -> PendingStore<LocalStore> {
        PendingStore::with_key(self.local.clone(), self.config.sync.pending_key.clone())
    }

    /// Returns a reconciler draining the queue into the remote.
    #[must_use]
    pub fn reconciler(&self) -> SyncReconciler<LocalStore, RemoteStore> {
        SyncReconciler::from_config(self.pending(), self.remote.clone(), &self.config.sync)
    }

    /// Returns a recorder writing to the remote.
    #[must_use]
    pub fn recorder(&self) -> ProgressRecorder<LocalStore, RemoteStore> {
        ProgressRecorder::from_config(self.pending(), self.remote.clone(), &self.config.sync)
    }
}
