//! Remote document database abstraction.
//!
//! This module defines the contract Lectern consumes from the managed
//! document database: point reads, filtered queries and atomic write
//! batches. The database itself is a black box; only its documented
//! failure modes matter here, and those surface as [`Error::Backend`]
//! with a machine-readable [`ErrorCode`](crate::error::ErrorCode).
//!
//! Two implementations ship with the crate:
//! - [`MemoryDocumentStore`]: in-process, for tests
//! - [`FileDocumentStore`]: a JSON snapshot on disk, used by the CLI as a
//!   local stand-in for the hosted database

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::kv::write_atomic;

/// A document body: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Address of a single document: `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

impl DocumentPath {
    /// Creates a document path.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if either segment is empty or contains `/`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        let id = id.into();
        for (label, segment) in [("collection", &collection), ("document id", &id)] {
            if segment.is_empty() {
                return Err(Error::InvalidInput(format!("{label} must not be empty")));
            }
            if segment.contains('/') {
                return Err(Error::InvalidInput(format!(
                    "{label} must not contain '/': {segment}"
                )));
            }
        }
        Ok(Self { collection, id })
    }

    /// Parses the `collection/id` form produced by `Display`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the string is not exactly two segments.
    pub fn parse(path: &str) -> Result<Self> {
        let (collection, id) = path
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("not a document path: {path}")))?;
        Self::new(collection, id)
    }

    /// Returns the collection segment.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the document id segment.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Value written to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain JSON value, replaces the field.
    Value(Value),
    /// Adds each element to an array field unless already present.
    ArrayUnion(Vec<Value>),
    /// Replaced by the backend's commit time (RFC 3339, UTC).
    ServerTimestamp,
}

/// A single staged mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Writes fields to a document, creating it if absent.
    Set {
        /// Target document.
        path: DocumentPath,
        /// Field writes, applied in order.
        fields: Vec<(String, FieldValue)>,
        /// Keep fields not named in `fields` when true; replace the document when false.
        merge: bool,
    },
    /// Deletes a document. Succeeds if it does not exist.
    Delete {
        /// Target document.
        path: DocumentPath,
    },
}

impl WriteOp {
    /// Returns the document this operation targets.
    #[must_use]
    pub fn path(&self) -> &DocumentPath {
        match self {
            Self::Set { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// An atomic multi-document write. Committed as a unit or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a merge-set.
    pub fn set_merge(&mut self, path: DocumentPath, fields: Vec<(String, FieldValue)>) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path,
            fields,
            merge: true,
        });
        self
    }

    /// Stages a full overwrite.
    pub fn set(&mut self, path: DocumentPath, fields: Vec<(String, FieldValue)>) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path,
            fields,
            merge: false,
        });
        self
    }

    /// Stages a delete.
    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the staged operations in order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// Sort direction for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A collection query with equality filters, optional ordering and limit.
///
/// Documents missing the `order_by` field are excluded, matching the hosted
/// backend's behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<(String, Value)>,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    /// Starts a query over `collection`.
    #[must_use]
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Orders results by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the queried collection.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    fn matches(&self, path: &DocumentPath, doc: &Document) -> bool {
        path.collection() == self.collection
            && self
                .filters
                .iter()
                .all(|(field, expected)| doc.get(field) == Some(expected))
            && self
                .order_by
                .as_ref()
                .is_none_or(|(field, _)| doc.contains_key(field))
    }

    /// Runs the query over an ordered document set.
    fn evaluate(&self, docs: &BTreeMap<DocumentPath, Document>) -> Vec<DocumentSnapshot> {
        let mut hits: Vec<DocumentSnapshot> = docs
            .iter()
            .filter(|(path, doc)| self.matches(path, doc))
            .map(|(path, doc)| DocumentSnapshot {
                path: path.clone(),
                data: doc.clone(),
            })
            .collect();

        if let Some((field, direction)) = &self.order_by {
            hits.sort_by(|a, b| {
                let ord = compare_values(a.data.get(field), b.data.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            hits.truncate(limit);
        }
        hits
    }
}

/// A document returned from a query.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Where the document lives.
    pub path: DocumentPath,
    /// Document body.
    pub data: Document,
}

/// Document database contract.
///
/// All backends (hosted, file, memory) implement this trait.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Reads a document. Returns `None` if it does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Runs a query and returns matching documents in query order.
    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>>;

    /// Commits a batch atomically.
    ///
    /// Either every operation is applied or none is. Committing an empty
    /// batch succeeds and changes nothing.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        (**self).get(path).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        (**self).query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch).await
    }
}

/// In-memory document store for testing.
///
/// Thread-safe via `RwLock`. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    docs: Arc<RwLock<BTreeMap<DocumentPath, Document>>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self) -> Result<BTreeMap<DocumentPath, Document>> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<DocumentPath, Document>>> {
        self.docs.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<DocumentPath, Document>>> {
        self.docs.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        Ok(self.read()?.get(path).cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        let docs = self.read()?;
        Ok(query.evaluate(&docs))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut docs = self.write()?;
        let overlay = stage_batch(&docs, &batch, &server_timestamp());
        apply_overlay(&mut docs, overlay);
        Ok(())
    }
}

/// Document store persisted as a single JSON snapshot file.
///
/// The file maps `collection/id` to document bodies. Every commit re-reads
/// the snapshot, applies the batch on top and rewrites it through a
/// temporary file and a rename, so commits from other handles on the same
/// file are kept. The in-memory view only changes once the file write
/// succeeded.
///
/// There is no cross-process lock: two commits racing between the re-read
/// and the rename still resolve as last writer wins.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    path: PathBuf,
    inner: MemoryDocumentStore,
}

impl FileDocumentStore {
    /// Opens the snapshot at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let docs = load_snapshot(&path)?;
        Ok(Self {
            path,
            inner: MemoryDocumentStore {
                docs: Arc::new(RwLock::new(docs)),
            },
        })
    }

    /// Returns the snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, docs: &BTreeMap<DocumentPath, Document>) -> Result<()> {
        let encoded: serde_json::Map<String, Value> = docs
            .iter()
            .map(|(path, doc)| (path.to_string(), Value::Object(doc.clone())))
            .collect();
        let raw = serde_json::to_string_pretty(&Value::Object(encoded))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::storage_with_source(format!("create {}", parent.display()), e)
            })?;
        }
        write_atomic(&self.path, &raw)
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.inner.get(path).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut docs = self.inner.write()?;
        let mut next = load_snapshot(&self.path)?;
        let overlay = stage_batch(&next, &batch, &server_timestamp());
        apply_overlay(&mut next, overlay);
        self.persist(&next)?;
        *docs = next;
        Ok(())
    }
}

/// Reads the snapshot at `path`. A missing file (or missing parent
/// directory) is an empty snapshot.
fn load_snapshot(path: &Path) -> Result<BTreeMap<DocumentPath, Document>> {
    match fs::read_to_string(path) {
        Ok(raw) => decode_snapshot(&raw),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            Ok(BTreeMap::new())
        }
        Err(e) => Err(Error::storage_with_source(
            format!("read {}", path.display()),
            e,
        )),
    }
}

fn decode_snapshot(raw: &str) -> Result<BTreeMap<DocumentPath, Document>> {
    let root: serde_json::Map<String, Value> = serde_json::from_str(raw)?;
    root.into_iter()
        .map(|(key, value)| match value {
            Value::Object(doc) => Ok((DocumentPath::parse(&key)?, doc)),
            _ => Err(Error::Serialization {
                message: format!("document {key} is not an object"),
            }),
        })
        .collect()
}

fn server_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Computes the post-commit state of every document the batch touches.
///
/// `None` marks a deletion. Later operations on the same document see the
/// effect of earlier ones.
fn stage_batch(
    current: &BTreeMap<DocumentPath, Document>,
    batch: &WriteBatch,
    now: &str,
) -> BTreeMap<DocumentPath, Option<Document>> {
    let mut overlay: BTreeMap<DocumentPath, Option<Document>> = BTreeMap::new();

    for op in batch.ops() {
        match op {
            WriteOp::Delete { path } => {
                overlay.insert(path.clone(), None);
            }
            WriteOp::Set {
                path,
                fields,
                merge,
            } => {
                let mut doc = if *merge {
                    overlay
                        .get(path)
                        .cloned()
                        .unwrap_or_else(|| current.get(path).cloned())
                        .unwrap_or_default()
                } else {
                    Document::new()
                };
                for (field, value) in fields {
                    apply_field(&mut doc, field, value, now);
                }
                overlay.insert(path.clone(), Some(doc));
            }
        }
    }

    overlay
}

fn apply_field(doc: &mut Document, field: &str, value: &FieldValue, now: &str) {
    match value {
        FieldValue::Value(v) => {
            doc.insert(field.to_string(), v.clone());
        }
        FieldValue::ServerTimestamp => {
            doc.insert(field.to_string(), Value::String(now.to_string()));
        }
        FieldValue::ArrayUnion(elements) => {
            let mut array = match doc.remove(field) {
                Some(Value::Array(existing)) => existing,
                _ => Vec::new(),
            };
            for element in elements {
                if !array.contains(element) {
                    array.push(element.clone());
                }
            }
            doc.insert(field.to_string(), Value::Array(array));
        }
    }
}

fn apply_overlay(
    docs: &mut BTreeMap<DocumentPath, Document>,
    overlay: BTreeMap<DocumentPath, Option<Document>>,
) {
    for (path, doc) in overlay {
        match doc {
            Some(doc) => {
                docs.insert(path, doc);
            }
            None => {
                docs.remove(&path);
            }
        }
    }
}

/// Orders JSON values: null < bool < number < string < other.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}
