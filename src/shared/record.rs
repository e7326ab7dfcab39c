//! Queued record model
//!
//! Every capture (assessment, deficiency, photo, voice note) becomes a
//! [`QueuedRecord`] in the local store. The record carries its sync status
//! and a category-specific [`RecordPayload`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::shared::error::{Result, SyncError};

/// Store partition a record belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Assessment,
    Deficiency,
    Photo,
    Recording,
}

impl Category {
    /// All categories in the order the sync engine drains them.
    /// Parents come before the records that reference them.
    pub const DRAIN_ORDER: [Category; 4] = [
        Category::Assessment,
        Category::Deficiency,
        Category::Photo,
        Category::Recording,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Assessment => "assessment",
            Category::Deficiency => "deficiency",
            Category::Photo => "photo",
            Category::Recording => "recording",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "assessment" => Ok(Category::Assessment),
            "deficiency" => Ok(Category::Deficiency),
            "photo" => Ok(Category::Photo),
            "recording" => Ok(Category::Recording),
            other => Err(SyncError::validation("category", format!("unknown category '{}'", other))),
        }
    }
}

/// Sync status of a queued record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Waiting to be uploaded
    Pending,
    /// Upload in flight
    Uploading,
    /// Accepted by the server
    Synced,
    /// Last upload attempt failed
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Uploading => "uploading",
            RecordStatus::Synced => "synced",
            RecordStatus::Failed => "failed",
        }
    }

    /// Whether `self -> next` is a legal lifecycle step.
    ///
    /// `synced` is terminal. A failed record has to go back through
    /// `pending -> uploading` before it can be synced. `uploading -> pending`
    /// exists for re-validating records interrupted mid-flight.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Uploading, Synced)
                | (Uploading, Failed)
                | (Uploading, Pending)
                | (Failed, Pending)
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "uploading" => Ok(RecordStatus::Uploading),
            "synced" => Ok(RecordStatus::Synced),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(SyncError::validation("status", format!("unknown status '{}'", other))),
        }
    }
}

/// Field assessment of a single building component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentPayload {
    /// Asset (building) the component belongs to
    pub asset_id: String,
    /// UNIFORMAT II element code, e.g. `B2010`
    pub component_code: String,
    /// Condition rating, 1 (failed) to 5 (excellent)
    pub condition_rating: u8,
    #[serde(default)]
    pub observations: String,
    #[serde(default)]
    pub estimated_repair_cost: Option<f64>,
    #[serde(default)]
    pub remaining_useful_life_years: Option<u32>,
    #[serde(default)]
    pub assessor: Option<String>,
}

impl AssessmentPayload {
    pub fn validate(&self) -> Result<()> {
        if self.asset_id.trim().is_empty() {
            return Err(SyncError::validation("asset_id", "asset id is required"));
        }
        if !is_uniformat_code(&self.component_code) {
            return Err(SyncError::validation(
                "component_code",
                format!("'{}' is not a UNIFORMAT II element code", self.component_code),
            ));
        }
        if !(1..=5).contains(&self.condition_rating) {
            return Err(SyncError::validation(
                "condition_rating",
                "condition rating must be between 1 and 5",
            ));
        }
        if matches!(self.estimated_repair_cost, Some(cost) if cost < 0.0 || !cost.is_finite()) {
            return Err(SyncError::validation(
                "estimated_repair_cost",
                "repair cost must be a non-negative amount",
            ));
        }
        Ok(())
    }
}

/// UNIFORMAT II codes: a major group letter A-G followed by up to four digits
/// (`B`, `B20`, `B2010`).
fn is_uniformat_code(code: &str) -> bool {
    let mut chars = code.chars();
    match chars.next() {
        Some(c) if ('A'..='G').contains(&c) => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    rest.len() <= 4 && rest.iter().all(|c| c.is_ascii_digit())
}

/// Deficiency severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A deficiency logged against an assessment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeficiencyPayload {
    /// Assessment the deficiency was found in (local or remote id)
    pub assessment_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    /// 1 (immediate) to 5 (deferrable)
    pub priority: u8,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
}

impl DeficiencyPayload {
    pub fn validate(&self) -> Result<()> {
        if self.assessment_id.trim().is_empty() {
            return Err(SyncError::validation("assessment_id", "assessment id is required"));
        }
        if self.title.trim().is_empty() {
            return Err(SyncError::validation("title", "deficiency title is required"));
        }
        if !(1..=5).contains(&self.priority) {
            return Err(SyncError::validation("priority", "priority must be between 1 and 5"));
        }
        Ok(())
    }
}

/// Where a photo was taken
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters
    pub accuracy: Option<f64>,
}

/// Photo queued for upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPayload {
    pub file_name: String,
    /// MIME type of `data`
    pub mime_type: String,
    /// MIME type of the original capture
    pub original_mime_type: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    /// Percent size reduction, 0 when queued uncompressed
    #[serde(default)]
    pub compression_ratio: f64,
    /// Bytes to upload
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Bytes as captured, kept so the photo can be re-derived
    #[serde(skip)]
    pub original: Option<Vec<u8>>,
}

/// Voice note queued for upload and transcription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPayload {
    pub mime_type: String,
    /// Free-form tag naming what the recording is about
    pub context: String,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(skip)]
    pub audio: Vec<u8>,
}

/// Category-specific record content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Assessment(AssessmentPayload),
    Deficiency(DeficiencyPayload),
    Photo(PhotoPayload),
    Recording(RecordingPayload),
}

impl RecordPayload {
    pub fn category(&self) -> Category {
        match self {
            RecordPayload::Assessment(_) => Category::Assessment,
            RecordPayload::Deficiency(_) => Category::Deficiency,
            RecordPayload::Photo(_) => Category::Photo,
            RecordPayload::Recording(_) => Category::Recording,
        }
    }

    /// Binary columns, stored outside the JSON document: `(data, original)`
    pub fn blobs(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        match self {
            RecordPayload::Photo(photo) => (Some(&photo.data), photo.original.as_deref()),
            RecordPayload::Recording(rec) => (Some(&rec.audio), None),
            _ => (None, None),
        }
    }

    /// Re-attach binary columns after the JSON document was loaded
    pub fn attach_blobs(&mut self, data: Option<Vec<u8>>, original: Option<Vec<u8>>) {
        match self {
            RecordPayload::Photo(photo) => {
                photo.data = data.unwrap_or_default();
                photo.original = original;
            }
            RecordPayload::Recording(rec) => rec.audio = data.unwrap_or_default(),
            _ => {}
        }
    }

    /// Approximate stored size in bytes
    pub fn size_hint(&self) -> usize {
        let (data, original) = self.blobs();
        data.map_or(0, <[u8]>::len) + original.map_or(0, <[u8]>::len)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            RecordPayload::Assessment(a) => a.validate(),
            RecordPayload::Deficiency(d) => d.validate(),
            RecordPayload::Photo(p) if p.data.is_empty() => {
                Err(SyncError::validation("data", "photo has no image data"))
            }
            RecordPayload::Recording(r) if r.audio.is_empty() => {
                Err(SyncError::validation("audio", "recording has no audio data"))
            }
            _ => Ok(()),
        }
    }
}

/// A capture waiting in (or confirmed by) the local store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRecord {
    /// Client-generated id, empty until [`LocalStore::save`](crate::local_db::LocalStore::save) assigns one
    pub local_id: String,
    /// Server id, assigned at most once
    pub remote_id: Option<String>,
    pub category: Category,
    /// Logical parent (asset, assessment) used by `get_by_parent`
    pub parent_id: Option<String>,
    pub payload: RecordPayload,
    pub status: RecordStatus,
    pub error_message: Option<String>,
    /// Upload attempts so far
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueuedRecord {
    /// New pending record without an id
    pub fn new(payload: RecordPayload) -> Self {
        let now = Utc::now();
        Self {
            local_id: String::new(),
            remote_id: None,
            category: payload.category(),
            parent_id: None,
            payload,
            status: RecordStatus::Pending,
            error_message: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_local_id(mut self, local_id: impl Into<String>) -> Self {
        self.local_id = local_id.into();
        self
    }

    pub fn generate_local_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Counts for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub pending: usize,
    pub uploading: usize,
    pub synced: usize,
    pub failed: usize,
}

impl CategoryStats {
    pub fn add(&mut self, status: RecordStatus, count: usize) {
        match status {
            RecordStatus::Pending => self.pending += count,
            RecordStatus::Uploading => self.uploading += count,
            RecordStatus::Synced => self.synced += count,
            RecordStatus::Failed => self.failed += count,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.uploading + self.synced + self.failed
    }
}

/// Derived counts of queued records, recomputed on demand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub categories: BTreeMap<Category, CategoryStats>,
    /// Pending records across all categories
    pub pending: usize,
    /// Failed records across all categories
    pub failed: usize,
    pub total: usize,
}

impl StorageStats {
    pub fn record(&mut self, category: Category, status: RecordStatus) {
        self.add(category, status, 1);
    }

    pub fn add(&mut self, category: Category, status: RecordStatus, count: usize) {
        self.categories.entry(category).or_default().add(status, count);
        match status {
            RecordStatus::Pending => self.pending += count,
            RecordStatus::Failed => self.failed += count,
            _ => {}
        }
        self.total += count;
    }

    pub fn category(&self, category: Category) -> CategoryStats {
        self.categories.get(&category).copied().unwrap_or_default()
    }
}
