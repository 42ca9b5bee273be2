//! Shared test utilities for Lectern tests.
//!
//! This crate provides:
//! - [`FailingDocumentStore`]: in-memory document store with call recording
//!   and injected backend errors
//! - [`FlakyKeyValueStore`]: local slot whose reads or writes can fail
//! - [`TestContext`] and entry builders for seeding pending lists
//!
//! # Example
//!
//! ```rust,ignore
//! use lectern_test_utils::{OpKind, TestContext, completion_entry};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.seed_pending(&[completion_entry("u1", "c1", "m1_l1", true, 1)]);
//!     ctx.remote.fail_quota(OpKind::Commit, 1);
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;

pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lectern_progress=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
