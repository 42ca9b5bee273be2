//! Test stores with operation recording and failure injection.
//!
//! [`FailingDocumentStore`] wraps the in-memory document store, records every
//! call (including failed ones) and returns injected backend errors.
//! [`FlakyKeyValueStore`] does the same for the local slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lectern_core::{
    Document, DocumentPath, DocumentSnapshot, DocumentStore, Error, ErrorCode, KeyValueStore,
    MemoryDocumentStore, MemoryKeyValueStore, Query, Result, WriteBatch, WriteOp,
};

/// Which document-store call an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// [`DocumentStore::get`].
    Get,
    /// [`DocumentStore::query`].
    Query,
    /// [`DocumentStore::commit`].
    Commit,
}

/// Record of a document-store call.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOp {
    /// A single-document read.
    Get {
        /// Path that was read.
        path: String,
    },
    /// A collection query.
    Query {
        /// Collection that was queried.
        collection: String,
    },
    /// A batch commit.
    Commit {
        /// Staged operations, in batch order.
        ops: Vec<WriteOp>,
    },
}

impl DocumentOp {
    /// Returns the kind of call.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Get { .. } => OpKind::Get,
            Self::Query { .. } => OpKind::Query,
            Self::Commit { .. } => OpKind::Commit,
        }
    }
}

#[derive(Debug, Clone)]
struct Injected {
    code: ErrorCode,
    message: String,
    /// `None` fails forever.
    remaining: Option<usize>,
}

/// Document store that records calls and fails on demand.
///
/// Clones share documents, recorded calls and injected failures.
#[derive(Debug, Clone, Default)]
pub struct FailingDocumentStore {
    inner: MemoryDocumentStore,
    operations: Arc<Mutex<Vec<DocumentOp>>>,
    failures: Arc<Mutex<HashMap<OpKind, Injected>>>,
    latency: Option<Duration>,
}

impl FailingDocumentStore {
    /// Creates an empty store with no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that sleeps before every call.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Returns the wrapped store, for seeding and inspecting documents.
    #[must_use]
    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }

    /// Fails the next `times` calls of `kind` with a quota error.
    pub fn fail_quota(&self, kind: OpKind, times: usize) {
        self.inject(kind, ErrorCode::ResourceExhausted, "Quota exceeded.", Some(times));
    }

    /// Fails every call of `kind` with a quota error.
    pub fn fail_quota_always(&self, kind: OpKind) {
        self.inject(kind, ErrorCode::ResourceExhausted, "Quota exceeded.", None);
    }

    /// Fails every call of `kind` with `code`.
    pub fn fail_always(&self, kind: OpKind, code: ErrorCode) {
        let message = format!("injected {code} failure");
        self.inject(kind, code, message, None);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn operations(&self) -> Vec<DocumentOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Number of recorded calls of `kind`, failed ones included.
    #[must_use]
    pub fn calls(&self, kind: OpKind) -> usize {
        self.operations
            .lock()
            .expect("lock")
            .iter()
            .filter(|op| op.kind() == kind)
            .count()
    }

    /// Operations of every commit attempt, in call order.
    #[must_use]
    pub fn commits(&self) -> Vec<Vec<WriteOp>> {
        self.operations
            .lock()
            .expect("lock")
            .iter()
            .filter_map(|op| match op {
                DocumentOp::Commit { ops } => Some(ops.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clears recorded calls.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    fn inject(&self, kind: OpKind, code: ErrorCode, message: impl Into<String>, remaining: Option<usize>) {
        self.failures.lock().expect("lock").insert(
            kind,
            Injected {
                code,
                message: message.into(),
                remaining,
            },
        );
    }

    fn record(&self, op: DocumentOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, kind: OpKind) -> Result<()> {
        let mut failures = self.failures.lock().expect("lock");
        let Some(injected) = failures.get_mut(&kind) else {
            return Ok(());
        };
        let err = Error::backend(injected.code.clone(), injected.message.clone());
        match &mut injected.remaining {
            None => Err(err),
            Some(0) => {
                failures.remove(&kind);
                Ok(())
            }
            Some(n) => {
                *n -= 1;
                if *n == 0 {
                    failures.remove(&kind);
                }
                Err(err)
            }
        }
    }

    async fn maybe_delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.maybe_delay().await;
        self.record(DocumentOp::Get {
            path: path.to_string(),
        });
        self.check_failure(OpKind::Get)?;
        self.inner.get(path).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        self.maybe_delay().await;
        self.record(DocumentOp::Query {
            collection: query.collection_name().to_string(),
        });
        self.check_failure(OpKind::Query)?;
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.maybe_delay().await;
        self.record(DocumentOp::Commit {
            ops: batch.ops().to_vec(),
        });
        self.check_failure(OpKind::Commit)?;
        self.inner.commit(batch).await
    }
}

/// Key-value store whose reads and writes can be switched to fail.
///
/// Clones share contents and switches.
#[derive(Debug, Clone, Default)]
pub struct FlakyKeyValueStore {
    inner: MemoryKeyValueStore,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyKeyValueStore {
    /// Creates an empty, healthy store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &MemoryKeyValueStore {
        &self.inner
    }

    /// Makes `get` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `remove` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::storage(format!("injected read failure for key: {key}")));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage(format!("injected write failure for key: {key}")));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage(format!("injected write failure for key: {key}")));
        }
        self.inner.remove(key)
    }
}
