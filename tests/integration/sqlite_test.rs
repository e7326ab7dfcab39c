//! The SQLite store across process restarts

use pretty_assertions::assert_eq;
use std::sync::Arc;

use fieldsync::app::SyncApp;
use fieldsync::local_db::{LocalDatabase, LocalStore};
use fieldsync::notify::Notifier;
use fieldsync::offline::PhotoFile;
use fieldsync::shared::{RecordPayload, RecordStatus};
use fieldsync::sync::NetworkMonitor;

use crate::assert_ok;
use crate::common::*;

async fn open(path: &std::path::Path) -> (LocalDatabase, LocalStore) {
    let database = assert_ok!(LocalDatabase::open(path).await);
    (database.clone(), LocalStore::new(database))
}

#[tokio::test]
async fn test_restart_recovers_interrupted_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue").join("fieldsync.db");

    let (database, store) = open(&path).await;
    let first = store.save(queued_assessment("bldg-1")).await.unwrap();
    let second = store.save(queued_assessment("bldg-2")).await.unwrap();
    store
        .update_status(&first, RecordStatus::Uploading, None)
        .await
        .unwrap();
    database.close().await;

    // Next launch
    let (database, store) = open(&path).await;
    let remote = FakeRemote::new();
    let app = assert_ok!(
        SyncApp::from_parts(
            test_config(),
            store.clone(),
            remote.clone(),
            Arc::new(NetworkMonitor::new(true)),
            Notifier::default(),
        )
        .await
    );
    assert_eq!(
        store.get(&first).await.unwrap().unwrap().status,
        RecordStatus::Pending
    );

    let result = assert_ok!(app.sync_now().await);
    assert_eq!(result.synced, 2);
    let sent: Vec<String> = remote
        .calls_of(CallKind::Assessment)
        .into_iter()
        .map(|c| c.key)
        .collect();
    assert_eq!(sent, vec![first, second]);

    let status = assert_ok!(app.status().await);
    assert_eq!(status.stats.total, 0);
    assert!(status.last_sync.is_some());

    assert_ok!(app.shutdown().await);
    database.close().await;
}

#[tokio::test]
async fn test_photo_blobs_persist_and_release() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldsync.db");
    let (database, store) = open(&path).await;

    let remote = FakeRemote::new();
    let app = assert_ok!(
        SyncApp::from_parts(
            test_config(),
            store.clone(),
            remote.clone(),
            Arc::new(NetworkMonitor::new(true)),
            Notifier::default(),
        )
        .await
    );

    let bytes: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let receipt = assert_ok!(
        app.photos()
            .attach_photo("srv-9", PhotoFile::new("wall.jpg", "image/jpeg", bytes.clone()), Some("North wall".into()))
            .await
    );
    assert_ok!(app.shutdown().await);
    database.close().await;

    let (database, store) = open(&path).await;
    let record = store.get(&receipt.local_id).await.unwrap().unwrap();
    match &record.payload {
        RecordPayload::Photo(photo) => {
            assert_eq!(photo.data, bytes);
            assert_eq!(photo.caption.as_deref(), Some("North wall"));
        }
        other => panic!("expected photo, got {:?}", other),
    }

    let app = assert_ok!(
        SyncApp::from_parts(
            test_config(),
            store.clone(),
            remote.clone(),
            Arc::new(NetworkMonitor::new(true)),
            Notifier::default(),
        )
        .await
    );
    assert_ok!(app.sync_now().await);

    let synced = store.get(&receipt.local_id).await.unwrap().unwrap();
    assert_eq!(synced.status, RecordStatus::Synced);
    assert_matches::assert_matches!(&synced.payload, RecordPayload::Photo(p) if p.data.is_empty() && p.original.is_none());
    assert_eq!(store.purge_synced().await.unwrap(), 1);

    assert_ok!(app.shutdown().await);
    database.close().await;
}
