//! Write and read paths around the pending queue.
//!
//! Writes go straight to the remote store and fall back to the local queue
//! when the backend reports a quota error. Reads go through the retry wrapper
//! and fall back to the last copy cached in the local slot.

use lectern_core::{
    Direction, DocumentPath, DocumentStore, KeyValueStore, Query, Result, WriteBatch,
};
use tracing::{debug, info, warn};

use crate::classify::Classify;
use crate::config::SyncConfig;
use crate::event::{PendingProgressEvent, ProgressUpdate};
use crate::metrics::ProgressMetrics;
use crate::pending::PendingStore;
use crate::progress::{
    CourseProgress, DEFAULT_PROGRESS_COLLECTION, LAST_UPDATED_FIELD, progress_document_id,
    progress_path, stage_lesson_completion,
};
use crate::retry::RetryPolicy;

/// Local key prefix for cached course-progress documents.
pub const PROGRESS_CACHE_PREFIX: &str = "progressCache";

/// Result of recording a lesson completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The remote store accepted the write.
    Committed,
    /// The remote store was over quota; the event was queued locally.
    Buffered(PendingProgressEvent),
}

/// Where a fetched progress document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    /// Read from the remote store.
    Remote,
    /// Remote was over quota; served from the local cache.
    Cache,
}

impl ProgressSource {
    /// Returns a short label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Cache => "cache",
        }
    }
}

/// A course-progress document and where it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedProgress {
    /// Document contents.
    pub progress: CourseProgress,
    /// Origin of the contents.
    pub source: ProgressSource,
}

/// Records lesson completions and reads course progress.
#[derive(Debug, Clone)]
pub struct ProgressRecorder<K, D> {
    pending: PendingStore<K>,
    remote: D,
    collection: String,
    retry: RetryPolicy,
    metrics: ProgressMetrics,
}

impl<K: KeyValueStore, D: DocumentStore> ProgressRecorder<K, D> {
    /// Creates a recorder with the default collection and retry policy.
    #[must_use]
    pub fn new(pending: PendingStore<K>, remote: D) -> Self {
        Self {
            pending,
            remote,
            collection: DEFAULT_PROGRESS_COLLECTION.to_string(),
            retry: RetryPolicy::default(),
            metrics: ProgressMetrics::new(),
        }
    }

    /// Creates a recorder from configuration.
    #[must_use]
    pub fn from_config(pending: PendingStore<K>, remote: D, config: &SyncConfig) -> Self {
        Self::new(pending, remote)
            .with_collection(config.progress_collection.clone())
            .with_retry(config.retry)
    }

    /// Overrides the progress collection.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Overrides the retry policy used for reads.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the local queue.
    #[must_use]
    pub fn pending(&self) -> &PendingStore<K> {
        &self.pending
    }

    /// Writes a lesson completion, queueing it locally if the backend is over quota.
    ///
    /// # Errors
    ///
    /// Returns the backend error when it is not a quota error, or when it is
    /// and the event could not be queued either.
    pub async fn record_lesson_completion(&self, update: ProgressUpdate) -> Result<RecordOutcome> {
        let mut batch = WriteBatch::new();
        stage_lesson_completion(
            &mut batch,
            &self.collection,
            &update.user_id,
            &update.course_id,
            &update.lesson_key,
        )?;

        match self.remote.commit(batch).await {
            Ok(()) => {
                debug!(
                    user_id = %update.user_id,
                    course_id = %update.course_id,
                    lesson_key = %update.lesson_key,
                    "recorded lesson completion"
                );
                self.metrics.record_direct_write("committed");
                Ok(RecordOutcome::Committed)
            }
            Err(e) if e.is_quota_exceeded() => {
                info!(
                    lesson_key = %update.lesson_key,
                    "quota exceeded, queueing lesson completion locally"
                );
                match self.pending.store_progress_locally(update) {
                    Some(event) => {
                        self.metrics.record_direct_write("buffered");
                        Ok(RecordOutcome::Buffered(event))
                    }
                    None => {
                        self.metrics.record_direct_write("failed");
                        Err(e)
                    }
                }
            }
            Err(e) => {
                self.metrics.record_direct_write("failed");
                Err(e)
            }
        }
    }

    /// Reads a user's progress in a course. Returns `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns non-quota errors immediately. A quota error that outlasts the
    /// retry policy is returned only when no cached copy exists.
    pub async fn fetch_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<FetchedProgress>> {
        let path = progress_path(&self.collection, user_id, course_id)?;

        match self.retry.run(|| self.remote.get(&path)).await {
            Ok(Some(doc)) => {
                let progress = CourseProgress::from_document(doc)?;
                self.cache(&path, user_id, course_id, &progress);
                Ok(Some(FetchedProgress {
                    progress,
                    source: ProgressSource::Remote,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_quota_exceeded() => match self.cached(user_id, course_id) {
                Some(progress) => {
                    warn!(%path, "high traffic, using cached data");
                    Ok(Some(FetchedProgress {
                        progress,
                        source: ProgressSource::Cache,
                    }))
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Lists a user's progress across courses, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns the query error once the retry policy gives up, or a
    /// serialization error if a document is malformed.
    pub async fn list_user_progress(&self, user_id: &str) -> Result<Vec<CourseProgress>> {
        let query = Query::collection(self.collection.clone())
            .where_eq("userId", user_id)
            .order_by(LAST_UPDATED_FIELD, Direction::Descending);

        let snapshots = self.retry.run(|| self.remote.query(&query)).await?;
        snapshots
            .into_iter()
            .map(|snapshot| CourseProgress::from_document(snapshot.data))
            .collect()
    }

    fn cache(&self, path: &DocumentPath, user_id: &str, course_id: &str, progress: &CourseProgress) {
        let key = cache_key(user_id, course_id);
        let stored = serde_json::to_string(progress)
            .map_err(lectern_core::Error::from)
            .and_then(|raw| self.pending.kv().set(&key, &raw));
        if let Err(e) = stored {
            warn!(%path, error = %e, "failed to cache course progress");
        }
    }

    fn cached(&self, user_id: &str, course_id: &str) -> Option<CourseProgress> {
        let key = cache_key(user_id, course_id);
        let raw = match self.pending.kv().get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(%key, error = %e, "cached course progress unreadable");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!(%key, error = %e, "cached course progress corrupt"))
            .ok()
    }
}

/// Local key caching a user's progress in a course.
#[must_use]
pub fn cache_key(user_id: &str, course_id: &str) -> String {
    format!(
        "{PROGRESS_CACHE_PREFIX}/{}",
        progress_document_id(user_id, course_id)
    )
}
