//! Photo capture: compress, locate and queue.
//!
//! Compression is best effort. If the compressor fails, the original bytes
//! are queued and the receipt carries a warning; a capture is never lost
//! to a compression error.

use std::sync::Arc;

use crate::local_db::LocalStore;
use crate::notify::location::{locate, LocationProvider};
use crate::notify::Notifier;
use crate::offline::compression::{
    optimal_compression_options, should_compress, CompressedPhoto, ImageCompressor, PhotoCompressor,
    PhotoFile,
};
use crate::shared::error::Result;
use crate::shared::record::{Category, PhotoPayload, QueuedRecord, RecordPayload};

/// What [`PhotoQueue::attach_photo`] stored
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoReceipt {
    pub local_id: String,
    pub compression_ratio: f64,
    /// Set when compression failed and the original was queued
    pub warning: Option<String>,
}

pub struct PhotoQueue {
    store: LocalStore,
    compressor: Arc<dyn PhotoCompressor>,
    location: Option<Arc<dyn LocationProvider>>,
    notifier: Option<Notifier>,
    compress: bool,
}

impl std::fmt::Debug for PhotoQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoQueue")
            .field("compress", &self.compress)
            .field("location", &self.location.is_some())
            .finish_non_exhaustive()
    }
}

impl PhotoQueue {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            compressor: Arc::new(ImageCompressor::new()),
            location: None,
            notifier: None,
            compress: true,
        }
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn PhotoCompressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Turn compression off entirely
    pub fn compression_enabled(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Compress `file` when worthwhile; falls back to the original with a
    /// warning on failure
    pub async fn prepare(&self, file: PhotoFile) -> (CompressedPhoto, Option<String>) {
        if !self.compress || !should_compress(&file) {
            return (CompressedPhoto::unchanged(file), None);
        }

        let options = optimal_compression_options(file.size());
        match self.compressor.compress(&file, options).await {
            Ok(compressed) => (compressed, None),
            Err(e) => {
                let warning = format!("Photo queued uncompressed: {}", e);
                tracing::warn!("[Photos] {} ({})", warning, file.file_name);
                (CompressedPhoto::unchanged(file), Some(warning))
            }
        }
    }

    /// Queue a photo for `parent_id` (usually an assessment's local id)
    pub async fn attach_photo(
        &self,
        parent_id: &str,
        file: PhotoFile,
        caption: Option<String>,
    ) -> Result<PhotoReceipt> {
        let (photo, warning) = self.prepare(file).await;
        let location = locate(self.location.as_deref()).await;

        let compressed = photo.compression_ratio > 0.0;
        let payload = PhotoPayload {
            file_name: photo.compressed.file_name,
            mime_type: photo.compressed.mime_type,
            original_mime_type: photo.original.mime_type,
            caption,
            location,
            compression_ratio: photo.compression_ratio,
            data: photo.compressed.data,
            // Only worth keeping when it differs from what is uploaded
            original: compressed.then_some(photo.original.data),
        };

        let record = QueuedRecord::new(RecordPayload::Photo(payload)).with_parent(parent_id);
        let local_id = self.store.save(record).await?;

        tracing::info!(
            "[Photos] Queued photo {} for {} ({}% smaller)",
            local_id,
            parent_id,
            photo.compression_ratio
        );
        if let Some(notifier) = &self.notifier {
            notifier.queued_offline(Category::Photo, &local_id);
        }

        Ok(PhotoReceipt {
            local_id,
            compression_ratio: photo.compression_ratio,
            warning,
        })
    }

    /// Photos queued against `parent_id`, oldest first
    pub async fn photos_for(&self, parent_id: &str) -> Result<Vec<QueuedRecord>> {
        let records = self.store.get_by_parent(parent_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.category == Category::Photo)
            .collect())
    }
}
