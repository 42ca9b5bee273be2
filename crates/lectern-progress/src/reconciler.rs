//! Sync reconciler: drains the pending queue into one atomic batch.
//!
//! # How It Works
//!
//! 1. Load the pending list; an empty (or unreadable) list is a successful no-op
//! 2. Keep the most recent `lesson_completion` event per `(user, course, lesson)`;
//!    recency is the event's sequence number, then its position in the list
//! 3. Stage one merge-set per kept event; other event types are skipped
//! 4. Commit the batch; on success clear the list, on failure leave it untouched
//!
//! The list is never partially acknowledged. A failed commit means the next
//! run sees exactly the same events, and a replayed completion is harmless
//! because the remote field is an append-only set.

use std::collections::HashMap;

use lectern_core::{DocumentStore, KeyValueStore, Result, WriteBatch, sync_span};
use serde::Serialize;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::SyncConfig;
use crate::event::{DedupKey, PendingProgressEvent};
use crate::metrics::ProgressMetrics;
use crate::pending::PendingStore;
use crate::progress::{DEFAULT_PROGRESS_COLLECTION, stage_lesson_completion};

/// Behavior switches for a reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Write unhandled event types back after a successful commit instead of
    /// discarding them with the rest of the list.
    pub retain_unhandled: bool,
}

/// What a reconciliation run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Events found in the pending list.
    pub pending: usize,
    /// Writes staged into the batch.
    pub staged: usize,
    /// Older `lesson_completion` duplicates skipped in favor of a newer event.
    pub superseded: usize,
    /// Events of types the reconciler does not apply.
    pub unhandled: usize,
    /// Whether a batch was committed (and the list cleared).
    pub committed: bool,
}

/// The outcome of deduplicating a pending list.
#[derive(Debug, Default)]
pub struct Selection<'a> {
    /// The winning event per dedup key, most recent first.
    pub latest: Vec<&'a PendingProgressEvent>,
    /// Number of `lesson_completion` events that lost to a newer duplicate.
    pub superseded: usize,
    /// Events of unhandled types, in list order.
    pub unhandled: Vec<&'a PendingProgressEvent>,
}

/// Picks the most recent `lesson_completion` event per dedup key.
///
/// Recency is `(sequence, position)`: a higher sequence number wins, and
/// among equal sequence numbers the later list entry wins.
#[must_use]
pub fn select_latest(events: &[PendingProgressEvent]) -> Selection<'_> {
    let mut winners: HashMap<DedupKey, (u64, usize)> = HashMap::new();
    let mut unhandled = Vec::new();
    let mut completions = 0;

    for (position, event) in events.iter().enumerate() {
        if !event.is_lesson_completion() {
            unhandled.push(event);
            continue;
        }
        completions += 1;
        let rank = (event.sequence, position);
        winners
            .entry(event.update.dedup_key())
            .and_modify(|best| {
                if rank > *best {
                    *best = rank;
                }
            })
            .or_insert(rank);
    }

    let mut ranked: Vec<(u64, usize)> = winners.into_values().collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));

    Selection {
        superseded: completions - ranked.len(),
        latest: ranked.into_iter().map(|(_, position)| &events[position]).collect(),
        unhandled,
    }
}

/// Drains a [`PendingStore`] into a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct SyncReconciler<K, D> {
    pending: PendingStore<K>,
    remote: D,
    collection: String,
    options: SyncOptions,
    metrics: ProgressMetrics,
}

impl<K: KeyValueStore, D: DocumentStore> SyncReconciler<K, D> {
    /// Creates a reconciler writing to the default progress collection.
    #[must_use]
    pub fn new(pending: PendingStore<K>, remote: D) -> Self {
        Self {
            pending,
            remote,
            collection: DEFAULT_PROGRESS_COLLECTION.to_string(),
            options: SyncOptions::default(),
            metrics: ProgressMetrics::new(),
        }
    }

    /// Creates a reconciler from configuration.
    #[must_use]
    pub fn from_config(pending: PendingStore<K>, remote: D, config: &SyncConfig) -> Self {
        Self::new(pending, remote)
            .with_collection(config.progress_collection.clone())
            .with_options(SyncOptions {
                retain_unhandled: config.retain_unhandled,
            })
    }

    /// Overrides the progress collection.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Overrides the behavior switches.
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the pending store being drained.
    #[must_use]
    pub fn pending(&self) -> &PendingStore<K> {
        &self.pending
    }

    /// Returns the remote store.
    #[must_use]
    pub fn remote(&self) -> &D {
        &self.remote
    }

    /// Drains the queue. Returns true on success (including "nothing to do").
    ///
    /// Never fails: errors are logged and reported as `false`, with the
    /// pending list left as it was.
    pub async fn sync_pending_updates(&self) -> bool {
        match self.reconcile().await {
            Ok(_) => true,
            Err(e) => {
                error!(key = %self.pending.key(), error = %e, "failed to sync pending progress updates");
                self.metrics.record_sync_run("failed");
                false
            }
        }
    }

    /// Drains the queue and reports what happened.
    ///
    /// # Errors
    ///
    /// Returns an error if staging or the batch commit fails (the pending list
    /// is untouched), or if clearing the list after a successful commit fails.
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let span = sync_span("reconcile", self.pending.key());
        self.reconcile_inner().instrument(span).await
    }

    async fn reconcile_inner(&self) -> Result<SyncReport> {
        let events = self.pending.pending_updates();
        self.metrics.set_pending(events.len());

        let mut report = SyncReport {
            pending: events.len(),
            ..SyncReport::default()
        };
        if events.is_empty() {
            debug!("no pending progress updates");
            self.metrics.record_sync_run("noop");
            return Ok(report);
        }

        let selection = select_latest(&events);
        report.superseded = selection.superseded;
        report.unhandled = selection.unhandled.len();

        let mut batch = WriteBatch::new();
        for event in &selection.latest {
            let update = &event.update;
            stage_lesson_completion(
                &mut batch,
                &self.collection,
                &update.user_id,
                &update.course_id,
                &update.lesson_key,
            )?;
        }
        report.staged = batch.len();

        if batch.is_empty() {
            info!(
                unhandled = report.unhandled,
                "no applicable progress updates, leaving pending list as is"
            );
            self.metrics.record_sync_run("noop");
            return Ok(report);
        }

        self.remote.commit(batch).await?;
        report.committed = true;
        self.metrics.record_committed(report.staged);

        if self.options.retain_unhandled && !selection.unhandled.is_empty() {
            let kept: Vec<PendingProgressEvent> =
                selection.unhandled.into_iter().cloned().collect();
            self.pending.replace(&kept)?;
        } else {
            if report.unhandled > 0 {
                warn!(
                    discarded = report.unhandled,
                    "discarding pending events of unhandled types"
                );
            }
            self.pending.clear()?;
        }

        info!(
            staged = report.staged,
            superseded = report.superseded,
            "synced pending progress updates"
        );
        self.metrics.record_sync_run("committed");
        Ok(report)
    }
}
