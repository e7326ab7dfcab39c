//! Capture fixtures and store constructors

use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use fieldsync::local_db::{LocalStore, MemoryStore};
use fieldsync::notify::{Toast, ToastSink};
use fieldsync::shared::{
    AppConfig, AssessmentPayload, DeficiencyPayload, QueuedRecord, RecordPayload,
    RecordingPayload, Severity,
};

pub fn memory_store() -> LocalStore {
    LocalStore::new(MemoryStore::new())
}

pub fn test_config() -> AppConfig {
    AppConfig::builder()
        .server_url("http://fieldsync.test")
        .build()
        .unwrap()
}

pub fn assessment(asset_id: &str) -> AssessmentPayload {
    AssessmentPayload {
        asset_id: asset_id.to_string(),
        component_code: "B3010".to_string(),
        condition_rating: 3,
        observations: "Membrane blistering at parapet".to_string(),
        estimated_repair_cost: Some(42_500.0),
        remaining_useful_life_years: Some(5),
        assessor: Some("field-team-2".to_string()),
    }
}

pub fn deficiency(assessment_id: &str) -> DeficiencyPayload {
    DeficiencyPayload {
        assessment_id: assessment_id.to_string(),
        title: "Failed flashing".to_string(),
        description: "Flashing separated along north parapet".to_string(),
        severity: Severity::High,
        priority: 1,
        estimated_cost: Some(6_000.0),
    }
}

pub fn recording(context: &str) -> RecordingPayload {
    RecordingPayload {
        mime_type: "audio/webm".to_string(),
        context: context.to_string(),
        duration_secs: Some(4.5),
        audio: vec![7; 256],
    }
}

pub fn queued_assessment(asset_id: &str) -> QueuedRecord {
    QueuedRecord::new(RecordPayload::Assessment(assessment(asset_id)))
}

/// Uncompressed BMP with enough detail that JPEG re-encoding shrinks it
pub fn gradient_bmp(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)
        .unwrap();
    bytes
}

/// Toast sink that keeps everything it is shown
#[derive(Debug, Default)]
pub struct CollectedToasts(Mutex<Vec<Toast>>);

impl CollectedToasts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn titles(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|t| t.title.clone()).collect()
    }
}

impl ToastSink for CollectedToasts {
    fn show(&self, toast: Toast) {
        self.0.lock().unwrap().push(toast);
    }
}
