//! # lectern-progress
//!
//! Offline-tolerant lesson-progress writes for the Lectern learning platform.
//!
//! When the document backend rejects writes because its quota is exhausted,
//! progress events are queued in a local key-value slot and replayed later in
//! one atomic batch. Reads retry quota errors with exponential backoff.
//!
//! ## Components
//!
//! - [`classify`]: decides whether an arbitrary error value is a quota error
//! - [`retry`]: bounded retry with doubling delays, quota errors only
//! - [`pending`]: the local queue of buffered events
//! - [`reconciler`]: deduplicates the queue and commits it as one batch
//! - [`recorder`]: direct writes with local fallback, cached reads
//!
//! ## Example
//!
//! ```rust
//! use lectern_core::{MemoryDocumentStore, MemoryKeyValueStore};
//! use lectern_progress::{PendingStore, ProgressUpdate, SyncReconciler};
//!
//! # tokio_test_runtime();
//! # fn tokio_test_runtime() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let pending = PendingStore::new(MemoryKeyValueStore::new());
//! pending.store_progress_locally(ProgressUpdate::lesson_completion("u1", "c1", "m1", "l1"));
//!
//! let reconciler = SyncReconciler::new(pending, MemoryDocumentStore::new());
//! assert!(reconciler.sync_pending_updates().await);
//! assert!(!reconciler.pending().has_pending_updates());
//! # });
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod config;
pub mod event;
pub mod metrics;
pub mod pending;
pub mod progress;
pub mod reconciler;
pub mod recorder;
pub mod retry;

pub use classify::{Classify, ErrorShape, is_quota_exceeded_error};
pub use config::SyncConfig;
pub use event::{DedupKey, EventType, PendingProgressEvent, ProgressUpdate, lesson_key};
pub use pending::{DEFAULT_PENDING_KEY, PendingStore};
pub use progress::{CourseProgress, DEFAULT_PROGRESS_COLLECTION, progress_percentage};
pub use reconciler::{SyncOptions, SyncReconciler, SyncReport, select_latest};
pub use recorder::{FetchedProgress, ProgressRecorder, ProgressSource, RecordOutcome};
pub use retry::{RetryPolicy, retry_with_backoff};
