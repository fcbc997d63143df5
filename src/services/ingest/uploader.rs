use super::types::UploadResult;
use crate::services::storage::{StorageService, object_key};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Object metadata attribute carrying the owner label
pub const OWNER_METADATA_KEY: &str = "owner-label";

/// Pushes staged files to the blob store. No retries here; the file processor
/// retries the whole workflow.
#[derive(Clone)]
pub struct Uploader {
    storage: Arc<dyn StorageService>,
}

impl Uploader {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }

    pub async fn upload(
        &self,
        local_path: &Path,
        remote_file_name: &str,
        folder_path: &str,
        owner_label: &str,
        content_type: &str,
    ) -> Result<UploadResult> {
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading staged file {:?}", local_path))?;
        let key = object_key(folder_path, remote_file_name);

        tracing::debug!(
            "Uploading {} ({:.2} KB) as {}",
            remote_file_name,
            data.len() as f64 / 1024.0,
            content_type
        );

        let metadata = HashMap::from([(OWNER_METADATA_KEY.to_string(), owner_label.to_string())]);
        self.storage
            .put_object(&key, data, content_type, metadata)
            .await
    }
}
