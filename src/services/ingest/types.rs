use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

pub use crate::services::cloud_providers::FileDescriptor;
pub use crate::services::storage::UploadResult;

/// Extensions treated as video when the declared MIME type is not conclusive
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "avi", "mkv", "webm", "wmv", "flv", "mpg", "mpeg", "3gp", "mts", "m2ts",
    "ts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Declared MIME type first, then the file extension against [`VIDEO_EXTENSIONS`].
    pub fn classify(mime_type: &str, file_name: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("video/") {
            return MediaKind::Video;
        }
        if mime.starts_with("image/") {
            return MediaKind::Image;
        }

        let is_video_ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        if is_video_ext {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedKind {
    Original,
    DerivedThumbnail,
    DerivedClip,
}

/// A local file owned by exactly one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub local_path: PathBuf,
    pub kind: StagedKind,
}

/// A derived artifact written to staging, ready to upload
#[derive(Debug, Clone)]
pub struct DerivedArtifact {
    pub path: PathBuf,
    /// Name the artifact gets in the blob store
    pub file_name: String,
    pub content_type: String,
}

/// Who the ingested media belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OwnerContext {
    pub order_id: String,
    pub owner_id: String,
    pub owner_label: String,
    pub parent_folder_id: Option<String>,
}

impl OwnerContext {
    /// Blob-store folder for every object of this owner: `{orderId}_{ownerId}_{ownerLabel}`
    pub fn folder_path(&self) -> String {
        format!("{}_{}_{}", self.order_id, self.owner_id, self.owner_label)
    }
}

/// Fields of one media record before it is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaRecord {
    pub order_id: String,
    pub owner_id: String,
    pub owner_label: String,
    pub media_type: MediaKind,
    pub original_url: String,
    pub original_key: String,
    pub preview_url: Option<String>,
    pub preview_key: Option<String>,
    pub parent_folder_id: Option<String>,
}

/// Terminal result of one descriptor after all its attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Completed { record_id: String, attempts: u32 },
    Failed { error: String, attempts: u32 },
}

impl FileOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, FileOutcome::Completed { .. })
    }
}

/// Final counts of one folder ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunSummary {
    pub completed: u64,
    pub failed: u64,
    /// Set when paging stopped early because the provider failed
    pub listing_error: Option<String>,
    /// Set when the run deadline cut the run short
    pub timed_out: bool,
    /// Highest number of file processors observed in flight
    pub peak_active: usize,
}
