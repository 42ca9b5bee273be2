//! # lectern-core
//!
//! Core abstractions shared by the Lectern progress-sync crates.
//!
//! This crate provides:
//!
//! - **Error Types**: one error enum that keeps the remote backend's
//!   machine-readable code
//! - **Local Slot**: the [`KeyValueStore`] trait plus memory and file backends
//! - **Document Store**: the [`DocumentStore`] trait, atomic [`WriteBatch`]es,
//!   queries, and memory and file backends
//! - **Observability**: logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use lectern_core::prelude::*;
//!
//! let local = MemoryKeyValueStore::new();
//! local.set("greeting", "hello").unwrap();
//!
//! let path = DocumentPath::new("userProgress", "u1_c1").unwrap();
//! let mut batch = WriteBatch::new();
//! batch.set_merge(path, vec![("lastUpdated".into(), FieldValue::ServerTimestamp)]);
//! assert_eq!(batch.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod document;
pub mod error;
pub mod kv;
pub mod observability;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::document::{
        Direction, Document, DocumentPath, DocumentSnapshot, DocumentStore, FieldValue,
        FileDocumentStore, MemoryDocumentStore, Query, WriteBatch, WriteOp,
    };
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
}

pub use document::{
    Direction, Document, DocumentPath, DocumentSnapshot, DocumentStore, FieldValue,
    FileDocumentStore, MemoryDocumentStore, Query, WriteBatch, WriteOp,
};
pub use error::{Error, ErrorCode, Result};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use observability::{LogFormat, init_logging, init_logging_with_default, sync_span};
