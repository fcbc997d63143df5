//! Folder ingestion: page through a remote folder, and for every image or video
//! download it, derive a preview, upload both to the blob store and record them.
//! Files sent directly by a client go through the same derive/upload/record steps.

pub mod deriver;
pub mod error;
pub mod pager;
pub mod processor;
pub mod record_writer;
pub mod scheduler;
pub mod staging;
pub mod store;
pub mod types;
pub mod upload;
pub mod uploader;

use crate::config::IngestConfig;
use crate::services::cloud_providers::FolderProvider;
use crate::services::storage::StorageService;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use deriver::ArtifactDeriver;
use error::IngestError;
use pager::ListingPager;
use processor::{FileProcessor, ProcessFile};
use record_writer::RecordWriter;
use scheduler::Scheduler;
use serde::Serialize;
use staging::StagingArea;
use std::sync::Arc;
use store::MediaStore;
use tokio::task::JoinHandle;
use types::{OwnerContext, RunSummary};
use upload::{UploadBatch, UploadOutcome};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RunStatus {
    Running {
        folder_id: String,
        started_at: DateTime<Utc>,
    },
    Finished {
        folder_id: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        summary: RunSummary,
    },
}

/// A started run. Awaiting `join` yields the final summary.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: String,
    pub folder_id: String,
    pub join: JoinHandle<RunSummary>,
}

/// Entry point of the pipeline: validates the folder, then runs ingestion in the background.
#[derive(Clone)]
pub struct IngestionService {
    provider: Arc<dyn FolderProvider>,
    processor: Arc<dyn ProcessFile>,
    store: Arc<MediaStore>,
    staging: StagingArea,
    config: IngestConfig,
    runs: Arc<DashMap<String, RunStatus>>,
}

impl IngestionService {
    pub fn new(
        config: IngestConfig,
        provider: Arc<dyn FolderProvider>,
        storage: Arc<dyn StorageService>,
        deriver: Arc<dyn ArtifactDeriver>,
        records: Arc<dyn RecordWriter>,
    ) -> Self {
        let staging = StagingArea::new(config.staging_dir.clone());
        let store = Arc::new(MediaStore::new(
            deriver,
            uploader::Uploader::new(storage),
            records,
            config.preview_clip_seconds,
        ));
        let processor = FileProcessor::new(&config, provider.clone(), store.clone(), staging.clone());

        Self {
            provider,
            processor: Arc::new(processor),
            store,
            staging,
            config,
            runs: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Precondition checks. Nothing is processed when this fails.
    pub async fn prepare(&self, folder_ref: &str) -> Result<String, IngestError> {
        let folder_id = self
            .provider
            .parse_folder_ref(folder_ref)
            .ok_or_else(|| IngestError::InvalidFolderReference(folder_ref.to_string()))?;

        if !self.provider.has_credentials() {
            return Err(IngestError::MissingApiKey);
        }

        if !self.provider.check_access(&folder_id).await? {
            return Err(IngestError::FolderNotAccessible(folder_id));
        }

        Ok(folder_id)
    }

    /// Runs a whole ingestion for an already validated folder
    pub async fn run_folder(&self, folder_id: &str, owner: OwnerContext) -> RunSummary {
        tracing::info!(
            "📁 Ingesting {} folder {} for order {} (owner {})",
            self.provider.provider_id(),
            folder_id,
            owner.order_id,
            owner.owner_id
        );

        if let Err(e) = self.staging.ensure_dir().await {
            tracing::error!("❌ Staging directory {:?} unusable: {}", self.staging.dir(), e);
        }

        let pager = ListingPager::new(self.provider.clone(), folder_id);
        let summary = Scheduler::new(pager, self.processor.clone(), self.config.max_concurrent)
            .with_run_timeout(self.config.run_timeout)
            .run(owner)
            .await;

        if summary.completed + summary.failed == 0 && summary.listing_error.is_none() {
            tracing::warn!("⚠️ No images or videos found in folder {}", folder_id);
        }
        summary
    }

    /// Validates and runs to completion
    pub async fn run_ingestion(
        &self,
        folder_ref: &str,
        owner: OwnerContext,
    ) -> Result<RunSummary, IngestError> {
        let folder_id = self.prepare(folder_ref).await?;
        Ok(self.run_folder(&folder_id, owner).await)
    }

    /// Validates, then starts the run on its own task and returns right away.
    /// The run's progress is visible through [`IngestionService::run_status`].
    pub async fn spawn(
        &self,
        folder_ref: &str,
        owner: OwnerContext,
    ) -> Result<RunHandle, IngestError> {
        let folder_id = self.prepare(folder_ref).await?;
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        self.runs.insert(
            run_id.clone(),
            RunStatus::Running {
                folder_id: folder_id.clone(),
                started_at,
            },
        );

        let service = self.clone();
        let task_run_id = run_id.clone();
        let task_folder_id = folder_id.clone();
        let join = tokio::spawn(async move {
            let summary = service.run_folder(&task_folder_id, owner).await;
            service.runs.insert(
                task_run_id,
                RunStatus::Finished {
                    folder_id: task_folder_id,
                    started_at,
                    finished_at: Utc::now(),
                    summary: summary.clone(),
                },
            );
            summary
        });

        Ok(RunHandle {
            run_id,
            folder_id,
            join,
        })
    }

    /// Empty batch for files sent directly by a client
    pub fn upload_batch(&self) -> UploadBatch {
        UploadBatch::new(self.staging.clone())
    }

    /// Derives, uploads and records every staged file of `batch`
    pub async fn store_uploads(&self, batch: UploadBatch, owner: &OwnerContext) -> Vec<UploadOutcome> {
        tracing::info!(
            "📤 Storing {} uploaded files for order {} (owner {})",
            batch.len(),
            owner.order_id,
            owner.owner_id
        );
        batch
            .store_all(&self.store, owner, self.config.attempt_timeout)
            .await
    }

    pub fn runs_in_progress(&self) -> usize {
        self.runs
            .iter()
            .filter(|entry| matches!(entry.value(), RunStatus::Running { .. }))
            .count()
    }

    pub fn run_status(&self, run_id: &str) -> Option<RunStatus> {
        self.runs.get(run_id).map(|status| status.value().clone())
    }
}
