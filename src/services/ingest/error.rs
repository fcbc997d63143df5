use std::time::Duration;
use thiserror::Error;

/// Failures that stop a run before any file is processed
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid folder reference: {0}")]
    InvalidFolderReference(String),

    #[error("Folder provider API key not configured")]
    MissingApiKey,

    #[error("Folder {0} is not publicly accessible")]
    FolderNotAccessible(String),

    #[error("Folder provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

/// Why a single workflow attempt failed. Every kind is retried the same way.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("download failed: {0}")]
    Download(#[source] anyhow::Error),

    #[error("derive failed: {0}")]
    Derive(#[source] anyhow::Error),

    #[error("upload failed: {0}")]
    Upload(#[source] anyhow::Error),

    #[error("record write failed: {0}")]
    Persist(#[source] anyhow::Error),

    #[error("staging failed: {0}")]
    Staging(#[from] std::io::Error),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl AttemptError {
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Download(_) => "download",
            AttemptError::Derive(_) => "derive",
            AttemptError::Upload(_) => "upload",
            AttemptError::Persist(_) => "persist",
            AttemptError::Staging(_) => "staging",
            AttemptError::Timeout(_) => "timeout",
        }
    }
}
