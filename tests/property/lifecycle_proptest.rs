//! Property-based tests for the record status lifecycle

use proptest::prelude::*;

use fieldsync::shared::RecordStatus;

use crate::common::*;

fn status() -> impl Strategy<Value = RecordStatus> {
    prop_oneof![
        Just(RecordStatus::Pending),
        Just(RecordStatus::Uploading),
        Just(RecordStatus::Synced),
        Just(RecordStatus::Failed),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Random walks through `update_status` never leave `synced` and never
    /// jump from `failed` straight to `synced`
    #[test]
    fn test_status_walk_is_monotonic(walk in prop::collection::vec(status(), 1..16)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let history = rt.block_on(async {
            let store = memory_store();
            let id = store.save(queued_assessment("bldg-1")).await.unwrap();
            let mut history = vec![RecordStatus::Pending];
            for next in &walk {
                if store.update_status(&id, *next, Some("boom")).await.is_ok() {
                    history.push(*next);
                }
            }
            let stored = store.get(&id).await.unwrap().unwrap().status;
            assert_eq!(Some(&stored), history.last());
            history
        });

        for pair in history.windows(2) {
            prop_assert_ne!(pair[0], RecordStatus::Synced);
            prop_assert!(!(pair[0] == RecordStatus::Failed && pair[1] == RecordStatus::Synced));
            prop_assert!(pair[0].can_transition_to(pair[1]));
        }
        if let Some(first_synced) = history.iter().position(|s| *s == RecordStatus::Synced) {
            prop_assert_eq!(first_synced, history.len() - 1);
            prop_assert_eq!(history[first_synced - 1], RecordStatus::Uploading);
        }
    }
}
