#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use drive_media_ingest::infrastructure::database;
use drive_media_ingest::services::cloud_providers::google_drive::parse_folder_id;
use drive_media_ingest::services::cloud_providers::{FileDescriptor, FolderProvider, ListingPage};
use drive_media_ingest::services::ingest::deriver::ArtifactDeriver;
use drive_media_ingest::services::storage::{StorageService, UploadResult};
use sea_orm::{Database, DatabaseConnection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

pub fn image(id: &str, name: &str) -> FileDescriptor {
    FileDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: "image/jpeg".to_string(),
    }
}

pub fn video(id: &str, name: &str) -> FileDescriptor {
    FileDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: "video/quicktime".to_string(),
    }
}

/// Count of files currently sitting in the staging directory
pub fn staged_file_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// Mock folder provider serving fixed pages; page N is requested with token "N".
pub struct MockProvider {
    pages: Vec<Vec<FileDescriptor>>,
    fail_on_page: Option<usize>,
    accessible: bool,
    credentialed: bool,
    /// Delay inside `list_page`, lets already spawned processors start running
    list_delay: Duration,
    /// Observed value of `started` at each page request
    started: Option<Arc<AtomicUsize>>,
    pub started_at_fetch: Mutex<Vec<usize>>,
    pub page_requests: Mutex<Vec<Option<String>>>,
    pub downloads: Mutex<HashMap<String, u32>>,
    download_failures: Mutex<HashMap<String, u32>>,
}

impl MockProvider {
    pub fn new(pages: Vec<Vec<FileDescriptor>>) -> Self {
        Self {
            pages,
            fail_on_page: None,
            accessible: true,
            credentialed: true,
            list_delay: Duration::ZERO,
            started: None,
            started_at_fetch: Mutex::new(Vec::new()),
            page_requests: Mutex::new(Vec::new()),
            downloads: Mutex::new(HashMap::new()),
            download_failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    pub fn inaccessible(mut self) -> Self {
        self.accessible = false;
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentialed = false;
        self
    }

    pub fn observing(mut self, started: Arc<AtomicUsize>, list_delay: Duration) -> Self {
        self.started = Some(started);
        self.list_delay = list_delay;
        self
    }

    pub fn fail_downloads(self, file_id: &str, times: u32) -> Self {
        self.download_failures
            .lock()
            .unwrap()
            .insert(file_id.to_string(), times);
        self
    }

    pub fn download_count(&self, file_id: &str) -> u32 {
        self.downloads
            .lock()
            .unwrap()
            .get(file_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl FolderProvider for MockProvider {
    fn provider_id(&self) -> &'static str {
        "mock"
    }

    fn parse_folder_ref(&self, folder_ref: &str) -> Option<String> {
        parse_folder_id(folder_ref)
    }

    fn has_credentials(&self) -> bool {
        self.credentialed
    }

    async fn check_access(&self, _folder_id: &str) -> anyhow::Result<bool> {
        Ok(self.accessible)
    }

    async fn list_page(
        &self,
        _folder_id: &str,
        page_token: Option<&str>,
    ) -> anyhow::Result<ListingPage> {
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        if let Some(started) = &self.started {
            self.started_at_fetch
                .lock()
                .unwrap()
                .push(started.load(Ordering::SeqCst));
        }
        self.page_requests
            .lock()
            .unwrap()
            .push(page_token.map(|t| t.to_string()));

        let index: usize = match page_token {
            None => 0,
            Some(token) => token.parse()?,
        };
        if self.fail_on_page == Some(index) {
            return Err(anyhow!("listing page {} unavailable", index));
        }

        let files = self.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
        Ok(ListingPage {
            files,
            next_page_token,
        })
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> anyhow::Result<u64> {
        *self
            .downloads
            .lock()
            .unwrap()
            .entry(file_id.to_string())
            .or_insert(0) += 1;

        {
            let mut failures = self.download_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(file_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(anyhow!("connection reset while downloading {}", file_id));
                }
            }
        }

        let content = format!("original bytes of {}", file_id).into_bytes();
        tokio::fs::write(dest, &content).await?;
        Ok(content.len() as u64)
    }
}

type KeyPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

// In-memory blob store; puts matching a rule fail a set number of times
pub struct MockStorageService {
    pub objects: Mutex<HashMap<String, (Vec<u8>, String, HashMap<String, String>)>>,
    fail_rule: Option<(KeyPredicate, Mutex<u32>)>,
    pub put_calls: AtomicUsize,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_rule: None,
            put_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        times: u32,
    ) -> Self {
        Self {
            fail_rule: Some((Box::new(predicate), Mutex::new(times))),
            ..Self::new()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> anyhow::Result<UploadResult> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((predicate, remaining)) = &self.fail_rule {
            if predicate(key) {
                let mut remaining = remaining.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(anyhow!("503 SlowDown for {}", key));
                }
            }
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            (data, content_type.to_string(), metadata),
        );
        Ok(UploadResult {
            location: format!("https://blobs.test/{}", key),
            key: key.to_string(),
        })
    }

    async fn delete_objects(&self, keys: &[String]) -> anyhow::Result<()> {
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

// Deriver that skips real transcoding
pub struct MockDeriver {
    delay: Duration,
}

impl MockDeriver {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ArtifactDeriver for MockDeriver {
    async fn derive_image_preview(&self, source: &Path) -> anyhow::Result<Vec<u8>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let original = tokio::fs::read(source).await?;
        Ok(format!("preview of {} bytes", original.len()).into_bytes())
    }

    async fn derive_video_clip(
        &self,
        _source: &Path,
        dest: &Path,
        duration_seconds: u32,
    ) -> anyhow::Result<PathBuf> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        tokio::fs::write(dest, format!("{}s clip", duration_seconds)).await?;
        Ok(dest.to_path_buf())
    }
}
