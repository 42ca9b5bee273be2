//! Reconciler behavior against a failure-injecting remote.
//!
//! # Invariants Tested
//!
//! 1. **All or nothing**: a failed commit leaves the pending list byte-for-byte unchanged
//! 2. **Last write wins**: one staged write per `(user, course, lesson)`
//! 3. **Unhandled types**: never staged; discarded on success unless retained

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde_json::{Value, json};

use lectern_core::{ErrorCode, FieldValue, KeyValueStore, MemoryKeyValueStore, WriteOp};
use lectern_progress::{
    PendingStore, ProgressUpdate, SyncConfig, SyncOptions, SyncReconciler, SyncReport,
};
use lectern_test_utils::{
    FailingDocumentStore, FlakyKeyValueStore, OpKind, PENDING_KEY, TestContext, completion_entry,
    init_test_logging, legacy_entry, unhandled_entry,
};

fn reconciler(ctx: &TestContext) -> SyncReconciler<MemoryKeyValueStore, FailingDocumentStore> {
    SyncReconciler::new(PendingStore::new(ctx.local.clone()), ctx.remote.clone())
}

/// Lesson keys added by each staged write, in batch order.
fn staged_unions(ops: &[WriteOp]) -> Vec<(String, Vec<Value>)> {
    ops.iter()
        .map(|op| {
            let WriteOp::Set { path, fields, merge } = op else {
                panic!("unexpected op: {op:?}");
            };
            assert!(*merge, "progress writes must merge");
            let added = fields
                .iter()
                .find_map(|(name, value)| match (name.as_str(), value) {
                    ("completedLessons", FieldValue::ArrayUnion(values)) => Some(values.clone()),
                    _ => None,
                })
                .expect("completedLessons union");
            (path.to_string(), added)
        })
        .collect()
}

#[tokio::test]
async fn empty_queue_is_a_successful_noop() {
    init_test_logging();
    let ctx = TestContext::new();

    let report = reconciler(&ctx).reconcile().await.expect("reconcile");

    assert_eq!(report, SyncReport::default());
    assert!(ctx.remote.operations().is_empty(), "no remote traffic");
}

#[tokio::test]
async fn has_pending_tracks_buffer_and_sync() {
    let ctx = TestContext::new();
    let reconciler = reconciler(&ctx);
    let pending = reconciler.pending();

    assert!(!pending.has_pending_updates());
    pending
        .store_progress_locally(ProgressUpdate::lesson_completion("u1", "c1", "m1", "l1"))
        .expect("buffered");
    assert!(pending.has_pending_updates());

    assert!(reconciler.sync_pending_updates().await);
    assert!(!pending.has_pending_updates());
    assert!(ctx.raw_pending().is_none());
}

#[tokio::test]
async fn incomplete_toggle_still_adds_lesson_once() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[
        completion_entry("u1", "c1", "m1_L1", true, 1),
        completion_entry("u1", "c1", "m1_L1", false, 2),
    ]);

    let report = reconciler(&ctx).reconcile().await.expect("reconcile");
    assert_eq!(report.staged, 1);
    assert_eq!(report.superseded, 1);
    assert!(report.committed);

    let commits = ctx.remote.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(
        staged_unions(&commits[0]),
        vec![("userProgress/u1_c1".to_string(), vec![json!("m1_L1")])]
    );
    assert!(ctx.raw_pending().is_none());

    let doc = ctx.remote_document("userProgress", "u1_c1").await.expect("doc");
    assert_eq!(doc["completedLessons"], json!(["m1_L1"]));
    assert_eq!(doc["userId"], json!("u1"));
    assert!(doc["lastUpdated"].is_string());
}

#[tokio::test]
async fn last_buffered_event_wins_per_lesson() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[
        completion_entry("u1", "c1", "m1_l1", true, 1),
        completion_entry("u1", "c1", "m1_l2", true, 2),
        completion_entry("u1", "c1", "m1_l1", true, 3),
        completion_entry("u2", "c1", "m1_l1", true, 4),
    ]);

    let report = reconciler(&ctx).reconcile().await.expect("reconcile");
    assert_eq!(report.pending, 4);
    assert_eq!(report.staged, 3);
    assert_eq!(report.superseded, 1);

    let staged = staged_unions(&ctx.remote.commits()[0]);
    assert_eq!(
        staged,
        vec![
            ("userProgress/u2_c1".to_string(), vec![json!("m1_l1")]),
            ("userProgress/u1_c1".to_string(), vec![json!("m1_l1")]),
            ("userProgress/u1_c1".to_string(), vec![json!("m1_l2")]),
        ],
        "most recent first"
    );

    let doc = ctx.remote_document("userProgress", "u1_c1").await.expect("doc");
    assert_eq!(doc["completedLessons"], json!(["m1_l1", "m1_l2"]));
}

#[tokio::test]
async fn legacy_entries_use_list_position() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[
        legacy_entry("u1", "c1", "m1_l1"),
        legacy_entry("u1", "c1", "m1_l2"),
    ]);

    let report = reconciler(&ctx).reconcile().await.expect("reconcile");
    assert_eq!(report.staged, 2);

    let staged = staged_unions(&ctx.remote.commits()[0]);
    assert_eq!(staged[0].1, vec![json!("m1_l2")], "later entry is more recent");
}

#[tokio::test]
async fn unhandled_events_are_discarded_on_success() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[
        unhandled_entry("u1", "c1", "quiz_attempt"),
        completion_entry("u1", "c1", "m1_l1", true, 1),
    ]);

    let report = reconciler(&ctx).reconcile().await.expect("reconcile");
    assert_eq!(report.unhandled, 1);
    assert_eq!(report.staged, 1);
    assert_eq!(ctx.remote.commits()[0].len(), 1);
    assert!(ctx.raw_pending().is_none());
}

#[tokio::test]
async fn unhandled_events_can_be_retained() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[
        unhandled_entry("u1", "c1", "quiz_attempt"),
        completion_entry("u1", "c1", "m1_l1", true, 1),
    ]);
    let reconciler = reconciler(&ctx).with_options(SyncOptions {
        retain_unhandled: true,
    });

    let report = reconciler.reconcile().await.expect("reconcile");
    assert!(report.committed);

    let remaining = reconciler.pending().pending_updates();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].update.event_type.as_str(), "quiz_attempt");
}

#[tokio::test]
async fn only_unhandled_events_leave_list_untouched() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[unhandled_entry("u1", "c1", "video_progress")]);
    let before = ctx.raw_pending();

    let report = reconciler(&ctx).reconcile().await.expect("reconcile");
    assert!(!report.committed);
    assert_eq!(report.staged, 0);
    assert_eq!(ctx.remote.calls(OpKind::Commit), 0);
    assert_eq!(ctx.raw_pending(), before);
}

#[tokio::test]
async fn failed_commit_leaves_list_byte_identical() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[
        completion_entry("u1", "c1", "m1_l1", true, 1),
        unhandled_entry("u1", "c1", "quiz_attempt"),
        completion_entry("u1", "c1", "m1_l1", false, 2),
    ]);
    let before = ctx.raw_pending().expect("seeded");

    for code in [ErrorCode::ResourceExhausted, ErrorCode::PermissionDenied] {
        ctx.remote.fail_always(OpKind::Commit, code);
        let reconciler = reconciler(&ctx);

        assert!(!reconciler.sync_pending_updates().await);
        assert_eq!(ctx.raw_pending().as_deref(), Some(before.as_str()));
        assert!(ctx.remote_document("userProgress", "u1_c1").await.is_none());
    }

    ctx.remote.clear_failures();
    assert!(reconciler(&ctx).sync_pending_updates().await);
    assert!(ctx.raw_pending().is_none());
}

#[tokio::test]
async fn commit_is_not_retried_within_a_run() {
    let ctx = TestContext::new();
    ctx.seed_pending(&[completion_entry("u1", "c1", "m1_l1", true, 1)]);
    ctx.remote.fail_quota(OpKind::Commit, 1);

    assert!(!reconciler(&ctx).sync_pending_updates().await);
    assert_eq!(ctx.remote.calls(OpKind::Commit), 1);

    assert!(reconciler(&ctx).sync_pending_updates().await);
    assert_eq!(ctx.remote.calls(OpKind::Commit), 2);
}

#[tokio::test]
async fn corrupt_list_is_treated_as_empty() {
    let ctx = TestContext::new();
    ctx.local.set(PENDING_KEY, "{not a list").expect("seed");

    assert!(reconciler(&ctx).sync_pending_updates().await);
    assert!(ctx.remote.operations().is_empty());
}

#[tokio::test]
async fn unreadable_slot_is_treated_as_empty() {
    let local = FlakyKeyValueStore::new();
    let remote = FailingDocumentStore::new();
    let pending = PendingStore::new(local.clone());
    pending
        .store_progress_locally(ProgressUpdate::lesson_completion("u1", "c1", "m1", "l1"))
        .expect("buffered");
    local.fail_reads(true);

    let reconciler = SyncReconciler::new(pending, remote.clone());
    assert!(reconciler.sync_pending_updates().await);
    assert!(remote.operations().is_empty());
}

#[tokio::test]
async fn failed_clear_reports_failure_after_commit() {
    let local = FlakyKeyValueStore::new();
    let remote = FailingDocumentStore::new();
    let pending = PendingStore::new(local.clone());
    pending
        .store_progress_locally(ProgressUpdate::lesson_completion("u1", "c1", "m1", "l1"))
        .expect("buffered");
    local.fail_writes(true);

    let reconciler = SyncReconciler::new(pending, remote.clone());
    assert!(!reconciler.sync_pending_updates().await);
    assert_eq!(remote.calls(OpKind::Commit), 1);

    // The list survives, and replaying it is harmless.
    local.fail_writes(false);
    assert!(reconciler.sync_pending_updates().await);
    let path = lectern_core::DocumentPath::new("userProgress", "u1_c1").expect("path");
    let doc = lectern_core::DocumentStore::get(remote.inner(), &path)
        .await
        .expect("get")
        .expect("doc");
    assert_eq!(doc["completedLessons"], json!(["m1_l1"]));
}

#[tokio::test]
async fn config_selects_key_and_collection() {
    let ctx = TestContext::new();
    let config = SyncConfig {
        pending_key: "queue".to_string(),
        progress_collection: "progress".to_string(),
        ..SyncConfig::default()
    };
    let pending = PendingStore::with_key(ctx.local.clone(), config.pending_key.clone());
    pending
        .store_progress_locally(ProgressUpdate::lesson_completion("u1", "c1", "m1", "l1"))
        .expect("buffered");

    let reconciler = SyncReconciler::from_config(pending, ctx.remote.clone(), &config);
    assert!(reconciler.sync_pending_updates().await);

    assert!(ctx.remote_document("progress", "u1_c1").await.is_some());
    assert!(ctx.remote_document("userProgress", "u1_c1").await.is_none());
    assert!(ctx.local.get("queue").expect("get").is_none());
}
