//! Local pending-write store.
//!
//! Buffered progress events live as one JSON array under a fixed key in an
//! injected [`KeyValueStore`]. The list only grows from the write path and
//! is emptied wholesale by the reconciler after a successful commit.
//!
//! Nothing here returns storage errors to the write path: a failed append is
//! logged and reported as `None`, and an unreadable list reads as empty.
//! Appends are read-modify-write and are not coordinated across processes.

use chrono::Utc;
use lectern_core::{Error, KeyValueStore, Result};
use tracing::{debug, error, warn};

use crate::event::{PendingProgressEvent, ProgressUpdate};
use crate::metrics::ProgressMetrics;

/// Key the pending list is stored under unless configured otherwise.
pub const DEFAULT_PENDING_KEY: &str = "pendingProgressUpdates";

/// Ordered queue of progress events awaiting a remote commit.
#[derive(Debug, Clone)]
pub struct PendingStore<K> {
    kv: K,
    key: String,
    metrics: ProgressMetrics,
}

impl<K: KeyValueStore> PendingStore<K> {
    /// Creates a store over `kv` using [`DEFAULT_PENDING_KEY`].
    #[must_use]
    pub fn new(kv: K) -> Self {
        Self::with_key(kv, DEFAULT_PENDING_KEY)
    }

    /// Creates a store over `kv` using a custom key.
    #[must_use]
    pub fn with_key(kv: K, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
            metrics: ProgressMetrics::new(),
        }
    }

    /// Returns the key the list is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the underlying key-value store.
    #[must_use]
    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Appends `update` to the queue, stamped with the current time and the
    /// next sequence number.
    ///
    /// Returns the stored event, or `None` if the slot could not be written.
    pub fn store_progress_locally(&self, update: ProgressUpdate) -> Option<PendingProgressEvent> {
        match self.append(update) {
            Ok(event) => {
                self.metrics.record_buffered();
                debug!(
                    key = %self.key,
                    sequence = event.sequence,
                    lesson_key = %event.update.lesson_key,
                    "buffered progress event"
                );
                Some(event)
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "failed to buffer progress event locally");
                None
            }
        }
    }

    /// Returns every buffered event in insertion order.
    ///
    /// An absent, unreadable or corrupt list reads as empty.
    #[must_use]
    pub fn pending_updates(&self) -> Vec<PendingProgressEvent> {
        match self.load() {
            Ok(events) => events,
            Err(e) => {
                warn!(key = %self.key, error = %e, "pending updates unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Returns true iff at least one event is buffered.
    #[must_use]
    pub fn has_pending_updates(&self) -> bool {
        !self.pending_updates().is_empty()
    }

    /// Returns the raw persisted value, byte for byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read.
    pub fn snapshot_raw(&self) -> Result<Option<String>> {
        self.kv.get(&self.key)
    }

    /// Strictly loads the list, surfacing read and parse failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or does not hold a valid list.
    pub fn load(&self) -> Result<Vec<PendingProgressEvent>> {
        match self.kv.get(&self.key)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| Error::Serialization {
                message: format!("pending list under {}: {e}", self.key),
            }),
        }
    }

    /// Replaces the whole list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be encoded or written.
    pub fn replace(&self, events: &[PendingProgressEvent]) -> Result<()> {
        if events.is_empty() {
            return self.clear();
        }
        let raw = serde_json::to_string(events)?;
        self.kv.set(&self.key, &raw)
    }

    /// Removes the whole list.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn clear(&self) -> Result<()> {
        self.kv.remove(&self.key)
    }

    fn append(&self, update: ProgressUpdate) -> Result<PendingProgressEvent> {
        let mut events = match self.load() {
            Ok(events) => events,
            Err(Error::Serialization { message }) => {
                warn!(key = %self.key, %message, "discarding corrupt pending list");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let sequence = events
            .iter()
            .map(|e| e.sequence)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| Error::Internal {
                message: format!("sequence space exhausted in pending list under {}", self.key),
            })?;
        let event = PendingProgressEvent {
            update,
            timestamp: Utc::now(),
            sequence,
        };
        events.push(event.clone());
        self.replace(&events)?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::MemoryKeyValueStore;

    fn update(lesson: &str) -> ProgressUpdate {
        ProgressUpdate::lesson_completion("u1", "c1", "m1", lesson)
    }

    #[test]
    fn test_append_preserves_order_and_assigns_sequence() {
        let store = PendingStore::new(MemoryKeyValueStore::new());
        assert!(!store.has_pending_updates());

        let first = store.store_progress_locally(update("l1")).expect("stored");
        let second = store.store_progress_locally(update("l2")).expect("stored");
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert!(second.timestamp >= first.timestamp);

        let pending = store.pending_updates();
        let keys: Vec<&str> = pending.iter().map(|e| e.update.lesson_key.as_str()).collect();
        assert_eq!(keys, vec!["m1_l1", "m1_l2"]);
        assert!(store.has_pending_updates());
    }

    #[test]
    fn test_corrupt_list_reads_as_empty() {
        let kv = MemoryKeyValueStore::new();
        kv.set(DEFAULT_PENDING_KEY, "[{broken").expect("set");
        let store = PendingStore::new(kv);

        assert!(store.pending_updates().is_empty());
        assert!(!store.has_pending_updates());
        assert!(store.load().is_err());
    }

    #[test]
    fn test_append_over_corrupt_list_starts_fresh() {
        let kv = MemoryKeyValueStore::new();
        kv.set(DEFAULT_PENDING_KEY, "not json").expect("set");
        let store = PendingStore::new(kv);

        let event = store.store_progress_locally(update("l1")).expect("stored");
        assert_eq!(event.sequence, 1);
        assert_eq!(store.pending_updates().len(), 1);
    }

    #[test]
    fn test_sequence_continues_after_legacy_entries() {
        let kv = MemoryKeyValueStore::new();
        let legacy = serde_json::json!([{
            "userId": "u1", "courseId": "c1", "moduleId": "m1", "lessonId": "l0",
            "lessonKey": "m1_l0", "completed": true,
            "timestamp": "2025-01-01T00:00:00Z", "type": "lesson_completion"
        }]);
        kv.set(DEFAULT_PENDING_KEY, &legacy.to_string()).expect("set");
        let store = PendingStore::new(kv);

        let event = store.store_progress_locally(update("l1")).expect("stored");
        assert_eq!(event.sequence, 1);
        assert_eq!(store.pending_updates()[0].sequence, 0);
    }

    #[test]
    fn test_exhausted_sequence_is_reported_not_stored() {
        let kv = MemoryKeyValueStore::new();
        let seeded = serde_json::json!([{
            "userId": "u1", "courseId": "c1", "moduleId": "m1", "lessonId": "l0",
            "lessonKey": "m1_l0", "completed": true,
            "timestamp": "2025-01-01T00:00:00Z", "type": "lesson_completion",
            "sequence": u64::MAX
        }])
        .to_string();
        kv.set(DEFAULT_PENDING_KEY, &seeded).expect("set");
        let store = PendingStore::new(kv.clone());

        assert!(store.store_progress_locally(update("l1")).is_none());
        assert_eq!(kv.get(DEFAULT_PENDING_KEY).expect("get"), Some(seeded));
        assert_eq!(store.pending_updates()[0].sequence, u64::MAX);
    }

    #[test]
    fn test_custom_key_and_clear() {
        let kv = MemoryKeyValueStore::new();
        let store = PendingStore::with_key(kv.clone(), "queue");
        store.store_progress_locally(update("l1")).expect("stored");
        assert!(kv.get("queue").expect("get").is_some());
        assert!(kv.get(DEFAULT_PENDING_KEY).expect("get").is_none());

        store.clear().expect("clear");
        assert!(!store.has_pending_updates());
        assert_eq!(store.snapshot_raw().expect("raw"), None);
    }
}
