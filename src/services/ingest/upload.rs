use super::error::AttemptError;
use super::staging::{StagingArea, StagingSession};
use super::store::{MediaStore, StoredMedia};
use super::types::{OwnerContext, StagedKind};
use anyhow::anyhow;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

struct PendingUpload {
    session: StagingSession,
    original_name: String,
    staged_name: String,
    path: PathBuf,
    content_type: String,
}

/// Result for one client-sent file
#[derive(Debug)]
pub struct UploadOutcome {
    pub file_name: String,
    pub result: Result<StoredMedia, AttemptError>,
}

/// Files of one upload request, staged on local disk until they are stored.
/// Every file gets its own staging session, so a request abandoned half way
/// leaves nothing behind.
pub struct UploadBatch {
    staging: StagingArea,
    files: Vec<PendingUpload>,
}

impl UploadBatch {
    pub fn new(staging: StagingArea) -> Self {
        Self {
            staging,
            files: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Streams one file into the staging directory and returns its size in bytes.
    /// Empty files are rejected.
    pub async fn stage<S, B, E>(
        &mut self,
        original_name: &str,
        content_type: &str,
        mut data: S,
    ) -> anyhow::Result<u64>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.staging.ensure_dir().await?;

        let mut session = self.staging.session();
        let staged_name = session.staged_name(original_name);
        let path = session.register(StagedKind::Original, &staged_name);

        let mut file = tokio::fs::File::create(&path).await?;
        let mut size = 0u64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            file.write_all(chunk.as_ref()).await?;
            size += chunk.as_ref().len() as u64;
        }
        file.flush().await?;

        if size == 0 {
            return Err(anyhow!("{} is empty", original_name));
        }

        self.files.push(PendingUpload {
            session,
            original_name: original_name.to_string(),
            staged_name,
            path,
            content_type: content_type.to_string(),
        });
        Ok(size)
    }

    /// Stores every staged file one after another. A failed file does not stop the others.
    /// There is no retry: the client still holds the bytes and can send them again.
    pub async fn store_all(
        self,
        store: &MediaStore,
        owner: &OwnerContext,
        attempt_timeout: Duration,
    ) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::with_capacity(self.files.len());

        for pending in self.files {
            let PendingUpload {
                mut session,
                original_name,
                staged_name,
                path,
                content_type,
            } = pending;

            let result = match tokio::time::timeout(
                attempt_timeout,
                store.store(&path, &staged_name, &content_type, owner, &mut session),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AttemptError::Timeout(attempt_timeout)),
            };

            session.cleanup().await;

            match &result {
                Ok(stored) => info!(
                    "✅ Uploaded {} stored as record {}",
                    original_name, stored.record_id
                ),
                Err(e) => error!("❌ Uploaded {} failed at {}: {}", original_name, e.kind(), e),
            }

            outcomes.push(UploadOutcome {
                file_name: original_name,
                result,
            });
        }

        outcomes
    }
}
