//! HTTP implementation of [`RemoteApi`](super::RemoteApi).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{IdResponse, RemoteApi, TranscriptionEntry};
use crate::shared::config::AppConfig;
use crate::shared::error::{Result, SyncError};
use crate::shared::record::{AssessmentPayload, DeficiencyPayload, PhotoPayload};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// reqwest client for the sync endpoints
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemoteApi {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(self.url(path));
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::network(format!("Failed to parse response: {}", e)))
    }
}

/// Map non-2xx responses to a network error carrying status and body
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    Err(SyncError::http(
        status.as_u16(),
        format!("Request failed: {} - {}", status, body),
    ))
}

fn file_part(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> Result<Part> {
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime_type)
        .map_err(|e| SyncError::validation("mime_type", format!("invalid MIME type: {}", e)))
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn upsert_assessment(&self, client_id: &str, assessment: &AssessmentPayload) -> Result<String> {
        let mut body = serde_json::to_value(assessment)?;
        if let Some(object) = body.as_object_mut() {
            object.insert("clientId".to_string(), client_id.into());
        }
        let id: IdResponse = self.send(self.post("/api/assessments").json(&body)).await?;
        Ok(id.into_string())
    }

    async fn create_deficiency(&self, client_id: &str, deficiency: &DeficiencyPayload) -> Result<String> {
        let mut body = serde_json::to_value(deficiency)?;
        if let Some(object) = body.as_object_mut() {
            object.insert("clientId".to_string(), client_id.into());
        }
        let id: IdResponse = self.send(self.post("/api/deficiencies").json(&body)).await?;
        Ok(id.into_string())
    }

    async fn upload_photo(
        &self,
        client_id: &str,
        assessment_id: Option<&str>,
        photo: &PhotoPayload,
    ) -> Result<String> {
        let mut metadata = serde_json::to_value(photo)?;
        if let Some(object) = metadata.as_object_mut() {
            object.insert("clientId".to_string(), client_id.into());
            if let Some(assessment_id) = assessment_id {
                object.insert("assessmentId".to_string(), assessment_id.into());
            }
        }

        let form = Form::new()
            .part("file", file_part(photo.data.clone(), &photo.file_name, &photo.mime_type)?)
            .text("metadata", metadata.to_string());

        let id: IdResponse = self.send(self.post("/api/photos").multipart(form)).await?;
        Ok(id.into_string())
    }

    async fn upload_audio(&self, file_name: &str, mime_type: &str, audio: Vec<u8>) -> Result<String> {
        let form = Form::new().part("file", file_part(audio, file_name, mime_type)?);
        let upload: UploadResponse = self.send(self.post("/api/upload").multipart(form)).await?;
        Ok(upload.url)
    }

    async fn transcribe(&self, audio_url: &str) -> Result<String> {
        let body = serde_json::json!({ "audioUrl": audio_url });
        let response: TranscribeResponse = self.send(self.post("/api/transcribe").json(&body)).await?;
        Ok(response.text)
    }

    async fn save_transcription(&self, entry: &TranscriptionEntry) -> Result<String> {
        let id: IdResponse = self.send(self.post("/api/transcriptions").json(entry)).await?;
        Ok(id.into_string())
    }
}
