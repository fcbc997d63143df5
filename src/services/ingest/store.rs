use super::deriver::{ArtifactDeriver, derive_artifact};
use super::error::AttemptError;
use super::record_writer::RecordWriter;
use super::staging::StagingSession;
use super::types::{MediaKind, NewMediaRecord, OwnerContext, UploadResult};
use super::uploader::Uploader;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// What a staged original turned into
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub record_id: String,
    pub kind: MediaKind,
    pub original: UploadResult,
    pub preview: UploadResult,
}

/// Derive, upload both artifacts, persist. Shared by folder ingestion and client uploads;
/// the caller owns the staging session and its cleanup.
pub struct MediaStore {
    deriver: Arc<dyn ArtifactDeriver>,
    uploader: Uploader,
    records: Arc<dyn RecordWriter>,
    clip_seconds: u32,
}

impl MediaStore {
    pub fn new(
        deriver: Arc<dyn ArtifactDeriver>,
        uploader: Uploader,
        records: Arc<dyn RecordWriter>,
        clip_seconds: u32,
    ) -> Self {
        Self {
            deriver,
            uploader,
            records,
            clip_seconds,
        }
    }

    pub async fn store(
        &self,
        original_path: &Path,
        staged_name: &str,
        mime_type: &str,
        owner: &OwnerContext,
        session: &mut StagingSession,
    ) -> Result<StoredMedia, AttemptError> {
        info!("Processing file: {}", staged_name);

        let kind = MediaKind::classify(mime_type, staged_name);
        let derived = derive_artifact(
            self.deriver.as_ref(),
            kind,
            original_path,
            staged_name,
            session,
            self.clip_seconds,
        )
        .await
        .map_err(AttemptError::Derive)?;

        // Both uploads run together
        let folder_path = owner.folder_path();
        let original_type = if mime_type.trim().is_empty() {
            mime::APPLICATION_OCTET_STREAM.as_ref()
        } else {
            mime_type
        };
        let (original, preview) = futures::future::try_join(
            self.uploader.upload(
                original_path,
                staged_name,
                &folder_path,
                &owner.owner_label,
                original_type,
            ),
            self.uploader.upload(
                &derived.path,
                &derived.file_name,
                &folder_path,
                &owner.owner_label,
                &derived.content_type,
            ),
        )
        .await
        .map_err(AttemptError::Upload)?;

        // Persist only once both uploads exist
        let record_id = self
            .records
            .create_record(NewMediaRecord {
                order_id: owner.order_id.clone(),
                owner_id: owner.owner_id.clone(),
                owner_label: owner.owner_label.clone(),
                media_type: kind,
                original_url: original.location.clone(),
                original_key: original.key.clone(),
                preview_url: Some(preview.location.clone()),
                preview_key: Some(preview.key.clone()),
                parent_folder_id: owner.parent_folder_id.clone(),
            })
            .await
            .map_err(AttemptError::Persist)?;

        Ok(StoredMedia {
            record_id,
            kind,
            original,
            preview,
        })
    }
}
