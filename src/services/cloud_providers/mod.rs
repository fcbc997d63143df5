use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A remote file as listed by the provider, not yet downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// One page of a folder listing
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub files: Vec<FileDescriptor>,
    /// `None` once the listing is exhausted
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait FolderProvider: Send + Sync {
    /// Provider identifier (e.g., "google_drive")
    fn provider_id(&self) -> &'static str;

    /// Extract the folder identifier from a shared folder link
    fn parse_folder_ref(&self, folder_ref: &str) -> Option<String>;

    /// Whether the provider has the credential it needs to talk to the remote API
    fn has_credentials(&self) -> bool {
        true
    }

    /// Whether the folder can be listed with the configured credential
    async fn check_access(&self, folder_id: &str) -> Result<bool>;

    /// Fetch one page of image/video descriptors inside the folder
    async fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<ListingPage>;

    /// Download file content into `dest`, returning the number of bytes written
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64>;
}

pub mod google_drive;
