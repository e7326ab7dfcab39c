//! Property-based tests for queue ordering and statistics

use proptest::prelude::*;
use std::collections::BTreeMap;

use fieldsync::shared::{
    Category, PhotoPayload, QueuedRecord, RecordPayload, RecordStatus,
};
use fieldsync::sync::SyncEngine;

use crate::common::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn category(index: u8) -> Category {
    Category::DRAIN_ORDER[index as usize % Category::DRAIN_ORDER.len()]
}

/// A record of `category` whose parent, if any, is already on the server
fn record_of(category: Category) -> QueuedRecord {
    let payload = match category {
        Category::Assessment => RecordPayload::Assessment(assessment("bldg-1")),
        Category::Deficiency => RecordPayload::Deficiency(deficiency("srv-asm")),
        Category::Photo => RecordPayload::Photo(PhotoPayload {
            file_name: "p.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            original_mime_type: "image/jpeg".to_string(),
            caption: None,
            location: None,
            compression_ratio: 0.0,
            data: vec![3; 64],
            original: None,
        }),
        Category::Recording => RecordPayload::Recording(recording("srv-asm")),
    };
    let record = QueuedRecord::new(payload);
    match category {
        Category::Photo => record.with_parent("srv-asm"),
        _ => record,
    }
}

fn call_kind(category: Category) -> CallKind {
    match category {
        Category::Assessment => CallKind::Assessment,
        Category::Deficiency => CallKind::Deficiency,
        Category::Photo => CallKind::Photo,
        Category::Recording => CallKind::Transcription,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_dispatch_is_fifo_within_category(indices in prop::collection::vec(0u8..4, 1..24)) {
        let rt = runtime();
        let (expected, sent) = rt.block_on(async {
            let store = memory_store();
            let remote = FakeRemote::new();
            let engine = SyncEngine::new(store.clone(), remote.clone(), &test_config());

            let mut expected: BTreeMap<Category, Vec<String>> = BTreeMap::new();
            for index in &indices {
                let category = category(*index);
                let id = store.save(record_of(category)).await.unwrap();
                expected.entry(category).or_default().push(id);
            }

            engine.start().await.unwrap();

            let sent: BTreeMap<Category, Vec<String>> = expected
                .keys()
                .map(|category| {
                    let keys = remote
                        .calls_of(call_kind(*category))
                        .into_iter()
                        .map(|c| c.key)
                        .collect();
                    (*category, keys)
                })
                .collect();
            (expected, sent)
        });
        prop_assert_eq!(expected, sent);
    }

    #[test]
    fn test_stats_match_stored_statuses(ops in prop::collection::vec((0u8..4, 0u8..4), 0..32)) {
        let rt = runtime();
        rt.block_on(async {
            let store = memory_store();
            for (index, target) in &ops {
                let id = store.save(record_of(category(*index))).await.unwrap();
                if *target == 0 {
                    continue;
                }
                store.update_status(&id, RecordStatus::Uploading, None).await.unwrap();
                match target {
                    2 => {
                        store.update_status(&id, RecordStatus::Failed, Some("timeout")).await.unwrap();
                    }
                    3 => {
                        store.update_status(&id, RecordStatus::Synced, None).await.unwrap();
                    }
                    _ => {}
                }
            }

            let stats = store.stats().await.unwrap();
            let mut pending = 0;
            let mut failed = 0;
            let mut total = 0;
            for category in Category::DRAIN_ORDER {
                let all = store.all(category).await.unwrap();
                let count = |status| all.iter().filter(|r| r.status == status).count();
                let counts = stats.category(category);
                assert_eq!(counts.pending, count(RecordStatus::Pending));
                assert_eq!(counts.uploading, count(RecordStatus::Uploading));
                assert_eq!(counts.synced, count(RecordStatus::Synced));
                assert_eq!(counts.failed, count(RecordStatus::Failed));
                pending += count(RecordStatus::Pending);
                failed += count(RecordStatus::Failed);
                total += all.len();
            }
            assert_eq!(stats.pending, pending);
            assert_eq!(stats.failed, failed);
            assert_eq!(stats.total, total);
            assert_eq!(total, ops.len());
        });
    }
}
