//! Assessment and deficiency capture.
//!
//! Captures are written to the local store first, whatever the
//! connectivity; the sync engine takes it from there.

use crate::local_db::LocalStore;
use crate::notify::Notifier;
use crate::shared::error::Result;
use crate::shared::record::{AssessmentPayload, DeficiencyPayload, QueuedRecord, RecordPayload};

#[derive(Debug, Clone)]
pub struct CaptureService {
    store: LocalStore,
    notifier: Option<Notifier>,
}

impl CaptureService {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Queue an assessment under its asset, returns the local id
    pub async fn save_assessment(&self, assessment: AssessmentPayload) -> Result<String> {
        let asset_id = assessment.asset_id.clone();
        let record = QueuedRecord::new(RecordPayload::Assessment(assessment)).with_parent(asset_id);
        self.queue(record).await
    }

    /// Queue a deficiency under its assessment (local or server id)
    pub async fn save_deficiency(&self, deficiency: DeficiencyPayload) -> Result<String> {
        let assessment_id = deficiency.assessment_id.clone();
        let record =
            QueuedRecord::new(RecordPayload::Deficiency(deficiency)).with_parent(assessment_id);
        self.queue(record).await
    }

    /// Assessments and deficiencies queued for a parent
    pub async fn queued_for(&self, parent_id: &str) -> Result<Vec<QueuedRecord>> {
        self.store.get_by_parent(parent_id).await
    }

    async fn queue(&self, record: QueuedRecord) -> Result<String> {
        let category = record.category;
        let local_id = self.store.save(record).await?;
        if let Some(notifier) = &self.notifier {
            notifier.queued_offline(category, &local_id);
        }
        tracing::info!("[Capture] Queued {} {}", category, local_id);
        Ok(local_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_db::MemoryStore;
    use crate::notify::{Toast, ToastSink};
    use crate::shared::error::SyncError;
    use crate::shared::record::{RecordStatus, Severity};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CollectedToasts(Mutex<Vec<Toast>>);

    impl ToastSink for CollectedToasts {
        fn show(&self, toast: Toast) {
            self.0.lock().unwrap().push(toast);
        }
    }

    fn assessment() -> AssessmentPayload {
        AssessmentPayload {
            asset_id: "bldg-7".to_string(),
            component_code: "D2010".to_string(),
            condition_rating: 2,
            observations: "Corroded supply lines".to_string(),
            estimated_repair_cost: Some(18_000.0),
            remaining_useful_life_years: Some(2),
            assessor: Some("j.doe".to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_assessment_and_deficiency() {
        let toasts = Arc::new(CollectedToasts::default());
        let store = LocalStore::new(MemoryStore::new());
        let capture = CaptureService::new(store.clone()).with_notifier(Notifier::new(toasts.clone()));

        let assessment_id = capture.save_assessment(assessment()).await.unwrap();
        let deficiency_id = capture
            .save_deficiency(DeficiencyPayload {
                assessment_id: assessment_id.clone(),
                title: "Pinhole leaks".to_string(),
                description: String::new(),
                severity: Severity::High,
                priority: 1,
                estimated_cost: None,
            })
            .await
            .unwrap();

        let under_asset = capture.queued_for("bldg-7").await.unwrap();
        assert_eq!(under_asset[0].local_id, assessment_id);

        let children = capture.queued_for(&assessment_id).await.unwrap();
        assert_eq!(children[0].local_id, deficiency_id);
        assert_eq!(children[0].status, RecordStatus::Pending);

        assert_eq!(toasts.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_assessment_not_queued() {
        let store = LocalStore::new(MemoryStore::new());
        let capture = CaptureService::new(store.clone());
        let mut bad = assessment();
        bad.condition_rating = 9;

        let err = capture.save_assessment(bad).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
        assert_eq!(store.stats().await.unwrap().total, 0);
    }
}
