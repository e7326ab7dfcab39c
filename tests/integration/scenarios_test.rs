//! Field workflows from capture to sync

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use fieldsync::notify::Notifier;
use fieldsync::offline::{CaptureService, PhotoFile, PhotoQueue, RecordingQueue};
use fieldsync::shared::{Category, RecordPayload, RecordStatus, SyncError, SyncEventType};
use fieldsync::sync::{ConnectivityWatcher, EventSubscription, NetworkMonitor, SyncEngine};

use crate::common::*;
use crate::{assert_all_status, assert_ok};

async fn wait_for(events: &mut EventSubscription, kind: SyncEventType) -> fieldsync::shared::SyncEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if event.event_type == kind {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for sync event")
}

#[tokio::test]
async fn test_offline_assessments_sync_on_reconnect() {
    let store = memory_store();
    let remote = FakeRemote::new();
    let monitor = Arc::new(NetworkMonitor::new(false));
    let toasts = CollectedToasts::new();
    let notifier = Notifier::new(toasts.clone());

    let engine = Arc::new(SyncEngine::new(store.clone(), remote.clone(), &test_config()));
    let watcher = ConnectivityWatcher::new(monitor.clone(), engine.clone())
        .with_notifier(notifier.clone())
        .spawn();
    let mut events = engine.subscribe();

    let capture = CaptureService::new(store.clone()).with_notifier(notifier);
    let mut ids = Vec::new();
    for asset in ["bldg-1", "bldg-2", "bldg-3"] {
        ids.push(assert_ok!(capture.save_assessment(assessment(asset)).await));
    }
    assert_eq!(store.stats().await.unwrap().category(Category::Assessment).pending, 3);
    assert!(remote.calls().is_empty());

    monitor.set_online(true);
    let complete = wait_for(&mut events, SyncEventType::Complete).await;
    let result = complete.result.unwrap();
    assert_eq!(result.synced, 3);
    assert!(result.success);

    assert_eq!(store.stats().await.unwrap().category(Category::Assessment).total(), 0);
    let sent: Vec<String> = remote
        .calls_of(CallKind::Assessment)
        .into_iter()
        .map(|c| c.key)
        .collect();
    assert_eq!(sent, ids);
    assert!(store.last_sync_time().await.unwrap().is_some());
    assert!(toasts.titles().contains(&"Back online".to_string()));

    watcher.abort();
}

#[tokio::test]
async fn test_recording_failures_retained_then_retried() {
    let store = memory_store();
    let remote = FakeRemote::new();
    let monitor = Arc::new(NetworkMonitor::new(true));
    let queue = RecordingQueue::new(store.clone(), remote.clone(), monitor, &test_config());

    for context in ["asm-1", "asm-2", "asm-3"] {
        let payload = recording(context);
        assert_ok!(
            queue
                .queue_recording(payload.audio, &payload.mime_type, &payload.context)
                .await
        );
    }

    remote.fail_next(3);
    let report = assert_ok!(queue.process_queue().await);
    assert_eq!(report.failed, 3);
    assert_eq!(report.succeeded, 0);

    let retained = queue.all_recordings().await.unwrap();
    assert_eq!(retained.len(), 3);
    assert_all_status!(retained, RecordStatus::Failed);
    assert!(retained.iter().all(|r| r.error_message.is_some()));

    let outcome = assert_ok!(queue.retry_failed().await);
    assert_eq!(outcome.reset, 3);
    assert_eq!(outcome.report.unwrap().succeeded, 3);
    assert!(queue.all_recordings().await.unwrap().is_empty());
    assert_eq!(remote.calls_of(CallKind::Transcription).len(), 3);
}

#[tokio::test]
async fn test_large_photo_compressed_before_queueing() {
    let store = memory_store();
    let queue = PhotoQueue::new(store.clone());
    // 1900x1900 RGB is a little over 10 MB as BMP
    let original = gradient_bmp(1900, 1900);
    assert!(original.len() > 10 * 1024 * 1024);

    let photo = PhotoFile::new("roof.bmp", "image/bmp", original.clone());
    let receipt = assert_ok!(queue.attach_photo("asm-1", photo, None).await);

    assert!(receipt.warning.is_none());
    assert!(receipt.compression_ratio > 0.0);

    let record = store.get(&receipt.local_id).await.unwrap().unwrap();
    let RecordPayload::Photo(stored) = record.payload else {
        panic!("expected a photo payload");
    };
    assert!(stored.data.len() < original.len());
    assert_eq!(stored.mime_type, "image/jpeg");
    assert_eq!(stored.original_mime_type, "image/bmp");
    assert_eq!(stored.original.map(|o| o.len()), Some(original.len()));
}

#[tokio::test]
async fn test_back_to_back_start_yields_one_result() {
    let store = memory_store();
    let remote = FakeRemote::with_latency(Duration::from_millis(30));
    let engine = SyncEngine::new(store.clone(), remote.clone(), &test_config());
    let mut events = engine.subscribe();

    store.save(queued_assessment("bldg-1")).await.unwrap();
    store.save(queued_assessment("bldg-2")).await.unwrap();

    let (first, second) = tokio::join!(engine.start(), engine.start());

    let result = assert_ok!(first);
    assert!(matches!(second, Err(SyncError::AlreadyRunning)));
    assert_eq!(result.total(), 2);
    assert_eq!(result.synced, 2);

    let kinds: Vec<SyncEventType> = events.drain().into_iter().map(|e| e.event_type).collect();
    assert_eq!(kinds.iter().filter(|k| **k == SyncEventType::Complete).count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == SyncEventType::Error).count(), 1);
    assert_eq!(remote.calls_of(CallKind::Assessment).len(), 2);
}
