//! Pre-built fixtures for progress-queue tests.
//!
//! Pending lists are built as raw JSON so tests can seed the local slot with
//! exactly the bytes an older client (or a corrupted one) would have left.

use serde_json::{Value, json};

use lectern_core::{
    Document, DocumentPath, DocumentStore, FieldValue, KeyValueStore, MemoryKeyValueStore,
    WriteBatch,
};

use crate::storage::FailingDocumentStore;

/// Local key the pending list lives under by default.
pub const PENDING_KEY: &str = "pendingProgressUpdates";

/// Test context with a local slot and a failure-injecting remote.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    /// Local key-value slot.
    pub local: MemoryKeyValueStore,
    /// Remote document store.
    pub remote: FailingDocumentStore,
}

impl TestContext {
    /// Creates a context with empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `entries` as the raw pending list.
    pub fn seed_pending(&self, entries: &[Value]) {
        let raw = Value::Array(entries.to_vec()).to_string();
        self.local.set(PENDING_KEY, &raw).expect("seed pending list");
    }

    /// Returns the raw pending list, if any.
    #[must_use]
    pub fn raw_pending(&self) -> Option<String> {
        self.local.get(PENDING_KEY).expect("read pending list")
    }

    /// Returns a remote document, if it exists.
    pub async fn remote_document(&self, collection: &str, id: &str) -> Option<Document> {
        let path = DocumentPath::new(collection, id).expect("valid path");
        self.remote.inner().get(&path).await.expect("read document")
    }

    /// Writes a remote document directly, bypassing injected failures.
    pub async fn seed_document(&self, collection: &str, id: &str, body: Value) {
        let path = DocumentPath::new(collection, id).expect("valid path");
        let Value::Object(fields) = body else {
            panic!("document body must be a JSON object");
        };
        let mut batch = WriteBatch::new();
        batch.set(
            path,
            fields
                .into_iter()
                .map(|(k, v)| (k, FieldValue::Value(v)))
                .collect(),
        );
        self.remote.inner().commit(batch).await.expect("seed document");
    }
}

/// A persisted `lesson_completion` entry.
#[must_use]
pub fn completion_entry(
    user_id: &str,
    course_id: &str,
    lesson_key: &str,
    completed: bool,
    sequence: u64,
) -> Value {
    let (module_id, lesson_id) = lesson_key.split_once('_').unwrap_or(("m", lesson_key));
    json!({
        "userId": user_id,
        "courseId": course_id,
        "moduleId": module_id,
        "lessonId": lesson_id,
        "lessonKey": lesson_key,
        "completed": completed,
        "timestamp": "2025-03-01T12:00:00Z",
        "type": "lesson_completion",
        "sequence": sequence,
    })
}

/// A persisted entry of a type the reconciler does not apply.
#[must_use]
pub fn unhandled_entry(user_id: &str, course_id: &str, event_type: &str) -> Value {
    json!({
        "userId": user_id,
        "courseId": course_id,
        "moduleId": "m1",
        "lessonId": "l1",
        "lessonKey": "m1_l1",
        "completed": true,
        "timestamp": "2025-03-01T12:00:00Z",
        "type": event_type,
    })
}

/// A persisted entry written before sequence numbers existed.
#[must_use]
pub fn legacy_entry(user_id: &str, course_id: &str, lesson_key: &str) -> Value {
    let mut entry = completion_entry(user_id, course_id, lesson_key, true, 0);
    if let Value::Object(fields) = &mut entry {
        fields.remove("sequence");
    }
    entry
}
