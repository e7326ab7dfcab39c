//! # Remote API
//!
//! The server endpoints the sync engine and recording queue talk to.
//! [`RemoteApi`] is the seam; [`http::HttpRemoteApi`] is the reqwest client.
//!
//! Every call returns the server's identifier (or URL / text) for the
//! submitted item. Upserts carry the record's `local_id` as `clientId`, so
//! replaying a request after an interrupted pass does not duplicate data.

pub mod http;

pub use http::HttpRemoteApi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::Result;
use crate::shared::record::{AssessmentPayload, DeficiencyPayload, PhotoPayload};

/// Transcription history entry persisted after a voice note is transcribed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionEntry {
    /// `local_id` of the queued recording
    pub client_id: String,
    pub text: String,
    pub audio_url: String,
    pub context: String,
    pub duration_secs: Option<f64>,
    /// RFC3339 capture time
    pub recorded_at: String,
}

/// Server endpoints used for synchronization
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `POST /api/assessments`, returns the server id
    async fn upsert_assessment(&self, client_id: &str, assessment: &AssessmentPayload) -> Result<String>;

    /// `POST /api/deficiencies`, returns the server id
    async fn create_deficiency(&self, client_id: &str, deficiency: &DeficiencyPayload) -> Result<String>;

    /// `POST /api/photos` (multipart), returns the server id
    async fn upload_photo(
        &self,
        client_id: &str,
        assessment_id: Option<&str>,
        photo: &PhotoPayload,
    ) -> Result<String>;

    /// `POST /api/upload` (multipart), returns the stored file URL
    async fn upload_audio(&self, file_name: &str, mime_type: &str, audio: Vec<u8>) -> Result<String>;

    /// `POST /api/transcribe`, returns the transcript
    async fn transcribe(&self, audio_url: &str) -> Result<String>;

    /// `POST /api/transcriptions`, returns the history entry id
    async fn save_transcription(&self, entry: &TranscriptionEntry) -> Result<String>;
}

/// `{ "id": ... }` response body
#[derive(Debug, Deserialize)]
pub(crate) struct IdResponse {
    pub id: serde_json::Value,
}

impl IdResponse {
    /// Servers answer with string or numeric ids
    pub fn into_string(self) -> String {
        match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }
    }
}
