//! In-process [`RemoteApi`] with failure injection
//!
//! Records every successful call so tests can assert ordering and count
//! duplicate uploads per `clientId`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fieldsync::remote::{RemoteApi, TranscriptionEntry};
use fieldsync::shared::{
    AssessmentPayload, DeficiencyPayload, PhotoPayload, Result, SyncError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Assessment,
    Deficiency,
    Photo,
    Audio,
    Transcribe,
    Transcription,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub kind: CallKind,
    /// `clientId` for records, file name or url for audio calls
    pub key: String,
    /// Parent id as sent to the server
    pub parent: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeRemote {
    down: AtomicBool,
    fail_next: AtomicUsize,
    latency: Option<Duration>,
    next_id: AtomicUsize,
    calls: Mutex<Vec<RemoteCall>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call waits `latency` before answering
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency: Some(latency),
            ..Self::default()
        })
    }

    /// While down every call fails with a network error
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// The next `count` calls fail with HTTP 503
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<RemoteCall> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    /// How many times `key` was sent with `kind`
    pub fn count(&self, kind: CallKind, key: &str) -> usize {
        self.calls_of(kind).iter().filter(|c| c.key == key).count()
    }

    async fn respond(&self, kind: CallKind, key: &str, parent: Option<&str>) -> Result<String> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(SyncError::network("connection refused"));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(SyncError::http(503, "Request failed: 503 - unavailable"));
        }

        self.calls.lock().unwrap().push(RemoteCall {
            kind,
            key: key.to_string(),
            parent: parent.map(str::to_string),
        });
        Ok(format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn upsert_assessment(&self, client_id: &str, assessment: &AssessmentPayload) -> Result<String> {
        self.respond(CallKind::Assessment, client_id, Some(&assessment.asset_id))
            .await
    }

    async fn create_deficiency(&self, client_id: &str, deficiency: &DeficiencyPayload) -> Result<String> {
        self.respond(CallKind::Deficiency, client_id, Some(&deficiency.assessment_id))
            .await
    }

    async fn upload_photo(
        &self,
        client_id: &str,
        assessment_id: Option<&str>,
        _photo: &PhotoPayload,
    ) -> Result<String> {
        self.respond(CallKind::Photo, client_id, assessment_id).await
    }

    async fn upload_audio(&self, file_name: &str, _mime_type: &str, _audio: Vec<u8>) -> Result<String> {
        let id = self.respond(CallKind::Audio, file_name, None).await?;
        Ok(format!("https://files.example/{}/{}", id, file_name))
    }

    async fn transcribe(&self, audio_url: &str) -> Result<String> {
        self.respond(CallKind::Transcribe, audio_url, None).await?;
        Ok("Water staining on ceiling tiles".to_string())
    }

    async fn save_transcription(&self, entry: &TranscriptionEntry) -> Result<String> {
        self.respond(CallKind::Transcription, &entry.client_id, Some(&entry.context))
            .await
    }
}
