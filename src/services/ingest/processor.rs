use super::error::AttemptError;
use super::staging::{StagingArea, StagingSession};
use super::store::MediaStore;
use super::types::{FileDescriptor, FileOutcome, OwnerContext, StagedKind};
use crate::config::IngestConfig;
use crate::services::cloud_providers::FolderProvider;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Turns one descriptor into a terminal outcome. Implementations never panic on
/// per-file failures; they report them as [`FileOutcome::Failed`].
#[async_trait]
pub trait ProcessFile: Send + Sync {
    async fn process(&self, descriptor: FileDescriptor, owner: &OwnerContext) -> FileOutcome;
}

/// Download, derive, upload and persist one file, re-running the whole workflow
/// up to `max_retries` times. Staged files are removed after every attempt.
pub struct FileProcessor {
    provider: Arc<dyn FolderProvider>,
    store: Arc<MediaStore>,
    staging: StagingArea,
    max_retries: u32,
    attempt_timeout: Duration,
}

impl FileProcessor {
    pub fn new(
        config: &IngestConfig,
        provider: Arc<dyn FolderProvider>,
        store: Arc<MediaStore>,
        staging: StagingArea,
    ) -> Self {
        Self {
            provider,
            store,
            staging,
            max_retries: config.max_retries.max(1),
            attempt_timeout: config.attempt_timeout,
        }
    }

    async fn run_attempt(
        &self,
        descriptor: &FileDescriptor,
        owner: &OwnerContext,
        session: &mut StagingSession,
    ) -> Result<String, AttemptError> {
        self.staging.ensure_dir().await?;

        let staged_name = session.staged_name(&descriptor.name);
        let original_path = session.register(StagedKind::Original, &staged_name);
        self.provider
            .download_file(&descriptor.id, &original_path)
            .await
            .map_err(AttemptError::Download)?;

        let stored = self
            .store
            .store(
                &original_path,
                &staged_name,
                &descriptor.mime_type,
                owner,
                session,
            )
            .await?;
        Ok(stored.record_id)
    }
}

#[async_trait]
impl ProcessFile for FileProcessor {
    async fn process(&self, descriptor: FileDescriptor, owner: &OwnerContext) -> FileOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut session = self.staging.session();

            let result = match tokio::time::timeout(
                self.attempt_timeout,
                self.run_attempt(&descriptor, owner, &mut session),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AttemptError::Timeout(self.attempt_timeout)),
            };

            // 6. Cleanup, whatever happened above
            session.cleanup().await;

            match result {
                Ok(record_id) => {
                    info!(
                        "✅ {} stored as record {} (attempt {}/{})",
                        descriptor.name, record_id, attempt, self.max_retries
                    );
                    return FileOutcome::Completed {
                        record_id,
                        attempts: attempt,
                    };
                }
                Err(e) if attempt < self.max_retries => {
                    warn!(
                        "⚠️ Attempt {}/{} for {} failed at {}: {}",
                        attempt,
                        self.max_retries,
                        descriptor.name,
                        e.kind(),
                        e
                    );
                }
                Err(e) => {
                    error!(
                        "❌ Giving up on {} after {} attempts: {}",
                        descriptor.name, attempt, e
                    );
                    return FileOutcome::Failed {
                        error: e.to_string(),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
