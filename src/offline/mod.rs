//! # Offline Capture
//!
//! Everything that puts work into the local queue while the device may be
//! offline.
//!
//! - **`compression`**: size-banded photo re-encoding
//! - **`photos`**: photo capture with compression and geolocation
//! - **`capture`**: assessment and deficiency capture
//! - **`recordings`**: voice notes and the upload-and-transcribe flow

pub mod capture;
pub mod compression;
pub mod photos;
pub mod recordings;

pub use capture::CaptureService;
pub use compression::{
    optimal_compression_options, should_compress, CompressedPhoto, CompressionOptions,
    ImageCompressor, PhotoCompressor, PhotoFile,
};
pub use photos::{PhotoQueue, PhotoReceipt};
pub use recordings::{QueueReport, RecordingQueue, RetryOutcome, TranscriptionOutcome};
