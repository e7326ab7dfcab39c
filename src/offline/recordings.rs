//! # Recording Queue
//!
//! Voice notes waiting to be uploaded and transcribed.
//!
//! A recording is transcribed in three calls: upload the audio
//! (`multipart/form-data` -> `{ url }`), transcribe it
//! (`{ audioUrl }` -> `{ text }`), then persist the transcript to the
//! history endpoint. The queued record is deleted once all three succeed.
//!
//! `process_queue` is single-flight and shares its flag with the sync
//! engine, so a recording is never uploaded by two passes at once.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::offline::{RecordingQueue, TranscriptionOutcome};
//!
//! # async fn example(queue: RecordingQueue, audio: Vec<u8>) -> fieldsync::shared::Result<()> {
//! match queue.upload_and_transcribe(audio, "audio/webm", "assessment-notes").await? {
//!     TranscriptionOutcome::Transcribed { text, .. } => println!("{}", text),
//!     TranscriptionOutcome::Queued { local_id } => println!("queued {}", local_id),
//! }
//!
//! // Later, when back online
//! let report = queue.process_queue().await?;
//! println!("{} of {} transcribed", report.succeeded, report.processed);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::local_db::LocalStore;
use crate::notify::{Notifier, Toast, ToastKind};
use crate::remote::{RemoteApi, TranscriptionEntry};
use crate::shared::config::AppConfig;
use crate::shared::error::{Result, SyncError};
use crate::shared::record::{Category, QueuedRecord, RecordPayload, RecordStatus, RecordingPayload};
use crate::sync::drain::{DrainPass, FlightGuard, Uploader};
use crate::sync::network_monitor::ConnectivityProvider;

/// Result of [`RecordingQueue::upload_and_transcribe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    /// Online path succeeded
    Transcribed { text: String, audio_url: String },
    /// Stored for a later `process_queue`
    Queued { local_id: String },
}

/// Counts from one `process_queue` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Pass stopped early at the failure threshold
    pub aborted: bool,
}

/// Result of [`RecordingQueue::retry_failed`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Recordings moved from `failed` back to `pending`
    pub reset: usize,
    /// The immediate re-run, when online
    pub report: Option<QueueReport>,
}

struct Transcript {
    text: String,
    audio_url: String,
    history_id: String,
}

fn audio_extension(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence {
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => "bin",
    }
}

/// Upload, transcribe and persist one recording
async fn transcribe(
    remote: &dyn RemoteApi,
    client_id: &str,
    recording: &RecordingPayload,
    recorded_at: String,
) -> Result<Transcript> {
    let file_name = format!("{}.{}", client_id, audio_extension(&recording.mime_type));
    let audio_url = remote
        .upload_audio(&file_name, &recording.mime_type, recording.audio.clone())
        .await?;
    let text = remote.transcribe(&audio_url).await?;

    let entry = TranscriptionEntry {
        client_id: client_id.to_string(),
        text: text.clone(),
        audio_url: audio_url.clone(),
        context: recording.context.clone(),
        duration_secs: recording.duration_secs,
        recorded_at,
    };
    let history_id = remote.save_transcription(&entry).await?;

    Ok(Transcript {
        text,
        audio_url,
        history_id,
    })
}

/// [`Uploader`] for queued recordings
pub struct RecordingUploader {
    remote: Arc<dyn RemoteApi>,
}

impl RecordingUploader {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    fn category(&self) -> Category {
        Category::Recording
    }

    async fn upload(&self, _store: &LocalStore, record: &QueuedRecord) -> Result<Option<String>> {
        let RecordPayload::Recording(recording) = &record.payload else {
            return Err(SyncError::validation(
                "payload",
                format!("recording {} has no audio payload", record.local_id),
            ));
        };
        let transcript = transcribe(
            self.remote.as_ref(),
            &record.local_id,
            recording,
            record.created_at.to_rfc3339(),
        )
        .await?;
        tracing::debug!(
            "[RecordingQueue] Transcribed {} ({} chars)",
            record.local_id,
            transcript.text.len()
        );
        Ok(Some(transcript.history_id))
    }
}

/// Queue of voice notes awaiting upload and transcription
pub struct RecordingQueue {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    connectivity: Arc<dyn ConnectivityProvider>,
    notifier: Option<Notifier>,
    processing: Arc<AtomicBool>,
    max_consecutive_failures: u32,
}

impl std::fmt::Debug for RecordingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingQueue")
            .field("processing", &self.is_processing_queue())
            .finish_non_exhaustive()
    }
}

impl RecordingQueue {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteApi>,
        connectivity: Arc<dyn ConnectivityProvider>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            notifier: None,
            processing: Arc::new(AtomicBool::new(false)),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Whether a `process_queue` pass (or an engine pass over recordings)
    /// is running
    pub fn is_processing_queue(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Single-flight flag shared with the sync engine
    pub fn processing_flag(&self) -> Arc<AtomicBool> {
        self.processing.clone()
    }

    pub fn uploader(&self) -> RecordingUploader {
        RecordingUploader::new(self.remote.clone())
    }

    /// Store a recording as `pending`, returns its id
    pub async fn queue_recording(&self, audio: Vec<u8>, mime_type: &str, context: &str) -> Result<String> {
        let record = QueuedRecord::new(RecordPayload::Recording(RecordingPayload {
            mime_type: mime_type.to_string(),
            context: context.to_string(),
            duration_secs: None,
            audio,
        }))
        .with_parent(context);

        let local_id = self.store.save(record).await?;
        tracing::info!("[RecordingQueue] Queued recording {} ({})", local_id, context);
        if let Some(notifier) = &self.notifier {
            notifier.queued_offline(Category::Recording, &local_id);
        }
        Ok(local_id)
    }

    /// Transcribe now when online; otherwise, or when the network fails
    /// midway, queue the recording
    pub async fn upload_and_transcribe(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
        context: &str,
    ) -> Result<TranscriptionOutcome> {
        if !self.connectivity.is_online() {
            let local_id = self.queue_recording(audio, mime_type, context).await?;
            return Ok(TranscriptionOutcome::Queued { local_id });
        }

        let payload = RecordingPayload {
            mime_type: mime_type.to_string(),
            context: context.to_string(),
            duration_secs: None,
            audio,
        };
        RecordPayload::Recording(payload.clone()).validate()?;

        let client_id = QueuedRecord::generate_local_id();
        match transcribe(self.remote.as_ref(), &client_id, &payload, Utc::now().to_rfc3339()).await {
            Ok(transcript) => {
                if let Some(notifier) = &self.notifier {
                    notifier.notify(Toast::new(
                        ToastKind::Success,
                        "Voice note transcribed",
                        format!("Saved to {} history", context),
                    ));
                }
                Ok(TranscriptionOutcome::Transcribed {
                    text: transcript.text,
                    audio_url: transcript.audio_url,
                })
            }
            Err(e) if e.is_network() => {
                tracing::warn!("[RecordingQueue] Transcription failed, queueing: {}", e);
                let local_id = self
                    .queue_recording(payload.audio, mime_type, context)
                    .await?;
                Ok(TranscriptionOutcome::Queued { local_id })
            }
            Err(e) => Err(e),
        }
    }

    /// Upload and transcribe every pending recording, oldest first.
    ///
    /// Does nothing when offline or when a pass is already running. Item
    /// failures are recorded on the recordings, not returned.
    pub async fn process_queue(&self) -> Result<QueueReport> {
        if !self.connectivity.is_online() {
            tracing::debug!("[RecordingQueue] Offline, not processing");
            return Ok(QueueReport::default());
        }
        let Some(_flight) = FlightGuard::try_acquire(&self.processing) else {
            tracing::debug!("[RecordingQueue] Already processing");
            return Ok(QueueReport::default());
        };

        let mut pass = DrainPass::new(&self.store, self.max_consecutive_failures);
        pass.drain(&self.uploader()).await?;

        let progress = pass.progress();
        let report = QueueReport {
            processed: progress.processed,
            succeeded: progress.synced,
            failed: progress.failed,
            aborted: pass.is_aborted(),
        };
        if report.processed > 0 {
            tracing::info!(
                "[RecordingQueue] Processed {} recording(s): {} succeeded, {} failed{}",
                report.processed,
                report.succeeded,
                report.failed,
                if report.aborted { ", rest skipped" } else { "" }
            );
            if let Some(notifier) = &self.notifier {
                notifier.pass_finished(&pass.result());
            }
        }
        Ok(report)
    }

    /// Reset failed recordings to pending and, when online, process them
    pub async fn retry_failed(&self) -> Result<RetryOutcome> {
        let reset = self.store.reset_failed(Some(Category::Recording)).await?;
        let report = if self.connectivity.is_online() {
            Some(self.process_queue().await?)
        } else {
            None
        };
        Ok(RetryOutcome { reset, report })
    }

    pub async fn pending_recordings(&self) -> Result<Vec<QueuedRecord>> {
        self.store
            .by_status(Category::Recording, RecordStatus::Pending)
            .await
    }

    pub async fn all_recordings(&self) -> Result<Vec<QueuedRecord>> {
        self.store.all(Category::Recording).await
    }
}
