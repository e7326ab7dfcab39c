//! Sync engine guarantees: single flight, dependency order, breaker

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use fieldsync::notify::Notifier;
use fieldsync::offline::{PhotoFile, PhotoQueue};
use fieldsync::shared::{Category, QueuedRecord, RecordPayload, RecordStatus, SyncError, SyncResult};
use fieldsync::sync::{SyncEngine, SyncPhase};

use crate::common::*;
use crate::{assert_all_status, assert_ok};

#[tokio::test]
async fn test_rapid_starts_upload_each_item_once() {
    let store = memory_store();
    let remote = FakeRemote::with_latency(Duration::from_millis(5));
    let engine = Arc::new(SyncEngine::new(store.clone(), remote.clone(), &test_config()));

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(store.save(queued_assessment(&format!("bldg-{}", i))).await.unwrap());
    }

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start().await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(e) => assert_matches!(e, SyncError::AlreadyRunning),
        }
    }
    assert!(completed >= 1);
    for id in &ids {
        assert_eq!(remote.count(CallKind::Assessment, id), 1, "{} uploaded more than once", id);
    }
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_children_sent_with_server_ids() {
    let store = memory_store();
    let remote = FakeRemote::new();
    let engine = SyncEngine::new(store.clone(), remote.clone(), &test_config());
    let photos = PhotoQueue::new(store.clone());

    let assessment_id = store.save(queued_assessment("bldg-1")).await.unwrap();
    let deficiency_id = store
        .save(QueuedRecord::new(RecordPayload::Deficiency(deficiency(&assessment_id))))
        .await
        .unwrap();
    let photo = assert_ok!(
        photos
            .attach_photo(&assessment_id, PhotoFile::new("a.jpg", "image/jpeg", vec![9; 2048]), None)
            .await
    );

    let result = assert_ok!(engine.start().await);
    assert_eq!(result.synced, 3);

    let server_id = "srv-1".to_string();
    let calls = remote.calls();
    assert_eq!(calls[0].kind, CallKind::Assessment);
    assert_eq!(calls[1].key, deficiency_id);
    assert_eq!(calls[1].parent.as_ref(), Some(&server_id));
    assert_eq!(calls[2].kind, CallKind::Photo);
    assert_eq!(calls[2].parent.as_ref(), Some(&server_id));

    // Photos stay behind as synced without their blobs
    let kept = store.get(&photo.local_id).await.unwrap().unwrap();
    assert_eq!(kept.status, RecordStatus::Synced);
    assert_eq!(kept.remote_id.as_deref(), Some("srv-3"));
    assert_matches!(kept.payload, RecordPayload::Photo(ref p) if p.data.is_empty());
    assert_eq!(store.purge_synced().await.unwrap(), 1);
    assert_eq!(store.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_failed_parent_blocks_child_until_retry() {
    let store = memory_store();
    let remote = FakeRemote::new();
    let engine = SyncEngine::new(store.clone(), remote.clone(), &test_config());

    let assessment_id = store.save(queued_assessment("bldg-1")).await.unwrap();
    let deficiency_id = store
        .save(QueuedRecord::new(RecordPayload::Deficiency(deficiency(&assessment_id))))
        .await
        .unwrap();

    remote.fail_next(1);
    let result = assert_ok!(engine.start().await);
    assert_eq!(result.failed, 2);
    assert!(!result.success);

    let child = store.get(&deficiency_id).await.unwrap().unwrap();
    assert_eq!(child.status, RecordStatus::Failed);
    assert!(child.error_message.unwrap().contains("not synced"));
    assert!(remote.calls_of(CallKind::Deficiency).is_empty());

    assert_eq!(store.reset_failed(None).await.unwrap(), 2);
    let result = assert_ok!(engine.start().await);
    assert_eq!(result.synced, 2);
    assert_eq!(store.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_breaker_skips_remaining_categories() {
    let store = memory_store();
    let remote = FakeRemote::new();
    remote.set_down(true);
    let engine = SyncEngine::new(store.clone(), remote.clone(), &test_config());

    for i in 0..5 {
        store.save(queued_assessment(&format!("bldg-{}", i))).await.unwrap();
    }
    store
        .save(QueuedRecord::new(RecordPayload::Deficiency(deficiency("srv-remote"))))
        .await
        .unwrap();

    let result = assert_ok!(engine.start().await);
    assert_eq!(result.failed, 3);
    assert_eq!(result.synced, 0);
    assert!(result.aborted);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.category(Category::Assessment).failed, 3);
    assert_eq!(stats.category(Category::Assessment).pending, 2);
    assert_eq!(stats.category(Category::Deficiency).pending, 1);
    let state = engine.state().await;
    assert_eq!(state.phase, SyncPhase::Idle);
    assert_matches!(state.last_result, Some(SyncResult { aborted: true, .. }));
    assert_eq!(engine.metrics().await.aborted_runs, 1);
}

#[tokio::test]
async fn test_synced_records_are_never_reuploaded() {
    let store = memory_store();
    let remote = FakeRemote::new();
    let engine = SyncEngine::new(store.clone(), remote.clone(), &test_config());
    let photos = PhotoQueue::new(store.clone());

    let receipt = assert_ok!(
        photos
            .attach_photo("srv-77", PhotoFile::new("a.jpg", "image/jpeg", vec![1; 512]), None)
            .await
    );
    assert_ok!(engine.start().await);
    assert_ok!(engine.start().await);
    assert_eq!(remote.count(CallKind::Photo, &receipt.local_id), 1);

    let err = store
        .update_status(&receipt.local_id, RecordStatus::Pending, None)
        .await
        .unwrap_err();
    assert_matches!(err, SyncError::InvalidTransition { .. });
    assert_eq!(store.reset_failed(None).await.unwrap(), 0);

    let kept = vec![store.get(&receipt.local_id).await.unwrap().unwrap()];
    assert_all_status!(kept, RecordStatus::Synced);
}

#[tokio::test]
async fn test_completion_toasts() {
    let store = memory_store();
    let remote = FakeRemote::new();
    let engine = SyncEngine::new(store.clone(), remote.clone(), &test_config());
    let toasts = CollectedToasts::new();
    let forwarder = tokio::spawn(Notifier::new(toasts.clone()).run(engine.subscribe()));

    store.save(queued_assessment("bldg-1")).await.unwrap();
    assert_ok!(engine.start().await);
    let _ = engine.start().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(toasts.titles(), vec!["Syncing".to_string(), "Sync complete".to_string()]);
    forwarder.abort();
}
