//! # Photo Compression
//!
//! Shrinks raster photos before they enter the queue. Targets are chosen by
//! input size: the bigger the capture, the smaller the max dimension and the
//! lower the JPEG quality.
//!
//! Decoding and encoding are CPU bound and run on the blocking pool.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::shared::error::{Result, SyncError};

/// Photos at or below this size are queued as captured
pub const COMPRESSION_THRESHOLD_BYTES: usize = 500 * 1024;

const MIB: usize = 1024 * 1024;

/// Raster formats the compressor can decode
pub const COMPRESSIBLE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// A photo as handed over by the capture surface
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PhotoFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Resize and re-encode targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Longest edge in pixels after resizing
    pub max_dimension: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

/// Result of [`PhotoCompressor::compress`]
#[derive(Debug, Clone)]
pub struct CompressedPhoto {
    pub original: PhotoFile,
    pub compressed: PhotoFile,
    /// Percent size reduction; 0 when the original was kept
    pub compression_ratio: f64,
}

impl CompressedPhoto {
    /// The original, unchanged, with a ratio of 0
    pub fn unchanged(original: PhotoFile) -> Self {
        Self {
            compressed: original.clone(),
            original,
            compression_ratio: 0.0,
        }
    }
}

/// Whether `file` is a raster image big enough to be worth re-encoding.
///
/// Vector, animated and unknown types are never touched.
pub fn should_compress(file: &PhotoFile) -> bool {
    let mime = file.mime_type.to_ascii_lowercase();
    COMPRESSIBLE_MIME_TYPES.contains(&mime.as_str()) && file.size() > COMPRESSION_THRESHOLD_BYTES
}

/// Size-banded targets for a payload of `size_bytes`
pub fn optimal_compression_options(size_bytes: usize) -> CompressionOptions {
    let (max_dimension, quality) = if size_bytes > 10 * MIB {
        (1600, 60)
    } else if size_bytes > 5 * MIB {
        (1920, 70)
    } else if size_bytes > 2 * MIB {
        (2048, 75)
    } else {
        (2560, 80)
    };
    CompressionOptions {
        max_dimension,
        quality,
    }
}

/// Percent reduction from `original` to `compressed` bytes, one decimal
pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 || compressed >= original {
        return 0.0;
    }
    let ratio = (1.0 - compressed as f64 / original as f64) * 100.0;
    (ratio * 10.0).round() / 10.0
}

/// Photo compression seam, swapped out in tests
#[async_trait]
pub trait PhotoCompressor: Send + Sync {
    async fn compress(&self, file: &PhotoFile, options: CompressionOptions) -> Result<CompressedPhoto>;
}

/// [`PhotoCompressor`] backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCompressor;

impl ImageCompressor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhotoCompressor for ImageCompressor {
    async fn compress(&self, file: &PhotoFile, options: CompressionOptions) -> Result<CompressedPhoto> {
        let original = file.clone();
        let data = file.data.clone();

        let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&data, options))
            .await
            .map_err(|e| SyncError::compression(format!("compression task failed: {}", e)))??;

        if encoded.len() >= original.size() {
            tracing::debug!(
                "[Compression] {} did not shrink ({} -> {} bytes), keeping original",
                original.file_name,
                original.size(),
                encoded.len()
            );
            return Ok(CompressedPhoto::unchanged(original));
        }

        let ratio = compression_ratio(original.size(), encoded.len());
        tracing::info!(
            "[Compression] {}: {} -> {} bytes ({}% smaller)",
            original.file_name,
            original.size(),
            encoded.len(),
            ratio
        );

        let compressed = PhotoFile::new(jpeg_file_name(&original.file_name), "image/jpeg", encoded);
        Ok(CompressedPhoto {
            original,
            compressed,
            compression_ratio: ratio,
        })
    }
}

/// Decode, downsize to `max_dimension` and re-encode as JPEG
pub fn encode_jpeg(data: &[u8], options: CompressionOptions) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;

    let img = if img.width() > options.max_dimension || img.height() > options.max_dimension {
        img.resize(options.max_dimension, options.max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, options.quality.clamp(1, 100));
    encoder.encode_image(&rgb)?;
    Ok(buffer)
}

fn jpeg_file_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{}.jpg", stem),
        _ => format!("{}.jpg", file_name),
    }
}
