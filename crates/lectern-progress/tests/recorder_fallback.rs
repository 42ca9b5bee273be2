//! Progress recorder: direct writes, local buffering and cached reads.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use serde_json::json;

use lectern_core::{Error, ErrorCode, KeyValueStore, MemoryKeyValueStore};
use lectern_progress::recorder::cache_key;
use lectern_progress::{
    PendingStore, ProgressRecorder, ProgressSource, ProgressUpdate, RecordOutcome, RetryPolicy,
    SyncReconciler,
};
use lectern_test_utils::{FailingDocumentStore, FlakyKeyValueStore, OpKind, TestContext};

fn recorder(ctx: &TestContext) -> ProgressRecorder<MemoryKeyValueStore, FailingDocumentStore> {
    ProgressRecorder::new(PendingStore::new(ctx.local.clone()), ctx.remote.clone())
        .with_retry(RetryPolicy::new(2, Duration::from_millis(10)))
}

#[tokio::test]
async fn quota_rejected_write_is_buffered_then_synced() {
    let ctx = TestContext::new();
    let recorder = recorder(&ctx);
    ctx.remote.fail_quota(OpKind::Commit, 1);

    let outcome = recorder
        .record_lesson_completion(ProgressUpdate::lesson_completion("u1", "c1", "m2", "l4"))
        .await
        .expect("buffered");

    let RecordOutcome::Buffered(event) = outcome else {
        panic!("expected buffering, got {outcome:?}");
    };
    assert_eq!(event.update.lesson_key, "m2_l4");
    assert_eq!(event.sequence, 1);
    assert!(recorder.pending().has_pending_updates());
    assert!(ctx.remote_document("userProgress", "u1_c1").await.is_none());

    let reconciler = SyncReconciler::new(PendingStore::new(ctx.local.clone()), ctx.remote.clone());
    assert!(reconciler.sync_pending_updates().await);

    let doc = ctx.remote_document("userProgress", "u1_c1").await.expect("doc");
    assert_eq!(doc["completedLessons"], json!(["m2_l4"]));
    assert!(!recorder.pending().has_pending_updates());
}

#[tokio::test]
async fn permanent_write_error_is_not_buffered() {
    let ctx = TestContext::new();
    let recorder = recorder(&ctx);
    ctx.remote.fail_always(OpKind::Commit, ErrorCode::PermissionDenied);

    let err = recorder
        .record_lesson_completion(ProgressUpdate::lesson_completion("u1", "c1", "m1", "l1"))
        .await
        .expect_err("propagated");

    assert_eq!(err.code(), Some(&ErrorCode::PermissionDenied));
    assert!(!recorder.pending().has_pending_updates());
    assert_eq!(ctx.remote.calls(OpKind::Commit), 1);
}

#[tokio::test]
async fn quota_error_surfaces_when_buffering_fails() {
    let local = FlakyKeyValueStore::new();
    let remote = FailingDocumentStore::new();
    remote.fail_quota_always(OpKind::Commit);
    local.fail_writes(true);
    let recorder = ProgressRecorder::new(PendingStore::new(local), remote);

    let err = recorder
        .record_lesson_completion(ProgressUpdate::lesson_completion("u1", "c1", "m1", "l1"))
        .await
        .expect_err("nowhere to put the event");

    assert!(matches!(
        err,
        Error::Backend {
            code: ErrorCode::ResourceExhausted,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn fetch_falls_back_to_cache_under_quota() {
    let ctx = TestContext::new();
    let recorder = recorder(&ctx);
    ctx.seed_document(
        "userProgress",
        "u1_c1",
        json!({
            "userId": "u1",
            "courseId": "c1",
            "completedLessons": ["m1_l1", "m1_l2"],
            "lastUpdated": "2025-03-01T12:00:00.000Z"
        }),
    )
    .await;

    let fresh = recorder
        .fetch_course_progress("u1", "c1")
        .await
        .expect("fetch")
        .expect("doc");
    assert_eq!(fresh.source, ProgressSource::Remote);

    ctx.remote.fail_quota_always(OpKind::Get);
    let cached = recorder
        .fetch_course_progress("u1", "c1")
        .await
        .expect("served from cache")
        .expect("doc");

    assert_eq!(cached.source, ProgressSource::Cache);
    assert_eq!(cached.progress, fresh.progress);
    assert_eq!(ctx.remote.calls(OpKind::Get), 1 + 3, "one read, then three under quota");
}

#[tokio::test(start_paused = true)]
async fn fetch_without_cache_returns_quota_error() {
    let ctx = TestContext::new();
    let recorder = recorder(&ctx);
    ctx.remote.fail_quota_always(OpKind::Get);

    let err = recorder
        .fetch_course_progress("u1", "c1")
        .await
        .expect_err("no cache to fall back to");
    assert_eq!(err.code(), Some(&ErrorCode::ResourceExhausted));
}

#[tokio::test]
async fn fetch_ignores_cache_for_permanent_errors() {
    let ctx = TestContext::new();
    let recorder = recorder(&ctx);
    ctx.local
        .set(
            &cache_key("u1", "c1"),
            &json!({ "userId": "u1", "courseId": "c1", "completedLessons": ["m1_l1"] })
                .to_string(),
        )
        .expect("seed cache");
    ctx.remote.fail_always(OpKind::Get, ErrorCode::PermissionDenied);

    let err = recorder
        .fetch_course_progress("u1", "c1")
        .await
        .expect_err("permanent");
    assert_eq!(err.code(), Some(&ErrorCode::PermissionDenied));
    assert_eq!(ctx.remote.calls(OpKind::Get), 1);
}

#[tokio::test]
async fn list_orders_by_last_update() {
    let ctx = TestContext::new();
    let recorder = recorder(&ctx);
    for (course, updated) in [
        ("c1", "2025-03-01T10:00:00.000Z"),
        ("c2", "2025-03-03T10:00:00.000Z"),
        ("c3", "2025-03-02T10:00:00.000Z"),
    ] {
        ctx.seed_document(
            "userProgress",
            &format!("u1_{course}"),
            json!({ "userId": "u1", "courseId": course, "completedLessons": [], "lastUpdated": updated }),
        )
        .await;
    }
    ctx.seed_document(
        "userProgress",
        "u2_c1",
        json!({ "userId": "u2", "courseId": "c1", "lastUpdated": "2025-03-04T10:00:00.000Z" }),
    )
    .await;

    let listed = recorder.list_user_progress("u1").await.expect("list");
    let courses: Vec<&str> = listed.iter().map(|p| p.course_id.as_str()).collect();
    assert_eq!(courses, vec!["c2", "c3", "c1"]);
}

#[tokio::test(start_paused = true)]
async fn list_retries_quota_errors() {
    let ctx = TestContext::new();
    let recorder = recorder(&ctx);
    ctx.remote.fail_quota(OpKind::Query, 2);

    let listed = recorder.list_user_progress("u1").await.expect("list");
    assert!(listed.is_empty());
    assert_eq!(ctx.remote.calls(OpKind::Query), 3);
}
