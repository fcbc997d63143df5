use super::types::FileDescriptor;
use crate::services::cloud_providers::FolderProvider;
use anyhow::Result;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageCursor {
    Start,
    Next(String),
    Exhausted,
}

/// Lazily walks a folder listing one page at a time. No retries: a failed fetch
/// ends paging for the run.
pub struct ListingPager {
    provider: Arc<dyn FolderProvider>,
    folder_id: String,
    cursor: PageCursor,
    pages_fetched: u32,
}

impl ListingPager {
    pub fn new(provider: Arc<dyn FolderProvider>, folder_id: impl Into<String>) -> Self {
        Self {
            provider,
            folder_id: folder_id.into(),
            cursor: PageCursor::Start,
            pages_fetched: 0,
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    /// Whether another page can still be requested
    pub fn has_more(&self) -> bool {
        self.cursor != PageCursor::Exhausted
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub async fn fetch_next_page(&mut self) -> Result<Vec<FileDescriptor>> {
        let token = match &self.cursor {
            PageCursor::Exhausted => return Ok(Vec::new()),
            PageCursor::Start => None,
            PageCursor::Next(token) => Some(token.clone()),
        };

        let page = match self
            .provider
            .list_page(&self.folder_id, token.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.cursor = PageCursor::Exhausted;
                return Err(e);
            }
        };

        self.pages_fetched += 1;
        self.cursor = match page.next_page_token {
            Some(next) => PageCursor::Next(next),
            None => PageCursor::Exhausted,
        };

        tracing::debug!(
            "Fetched page {} of folder {} ({} files, more: {})",
            self.pages_fetched,
            self.folder_id,
            page.files.len(),
            self.has_more()
        );

        Ok(page.files)
    }
}
