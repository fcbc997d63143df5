use super::types::{StagedFile, StagedKind};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Shared temporary directory for downloads and derived artifacts.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    last_stamp: Arc<AtomicI64>,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_stamp: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Millisecond timestamp, bumped past the last one handed out so that two
    /// attempts starting in the same millisecond still get distinct prefixes.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last_stamp.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Opens the per-attempt session that owns every path it hands out
    pub fn session(&self) -> StagingSession {
        StagingSession {
            dir: self.dir.clone(),
            stamp: self.next_stamp(),
            files: Vec::new(),
        }
    }
}

/// Replaces characters that would escape the staging directory or upset a shell tool
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "file".to_string(),
        _ => cleaned,
    }
}

/// Staged files of one attempt. `cleanup` removes them; if the session is dropped
/// without it (cancelled attempt) the leftovers are removed synchronously.
#[derive(Debug)]
pub struct StagingSession {
    dir: PathBuf,
    stamp: i64,
    files: Vec<StagedFile>,
}

impl StagingSession {
    /// `{timestamp}_{original name}`, shared by the local file and the uploaded object
    pub fn staged_name(&self, original_name: &str) -> String {
        format!("{}_{}", self.stamp, sanitize_file_name(original_name))
    }

    /// Registers `file_name` inside the staging directory and returns its path
    pub fn register(&mut self, kind: StagedKind, file_name: &str) -> PathBuf {
        let local_path = self.dir.join(sanitize_file_name(file_name));
        self.files.push(StagedFile {
            local_path: local_path.clone(),
            kind,
        });
        local_path
    }

    /// Takes ownership of a path produced outside [`StagingSession::register`]
    pub fn track(&mut self, kind: StagedKind, local_path: PathBuf) {
        if self.files.iter().all(|f| f.local_path != local_path) {
            self.files.push(StagedFile { local_path, kind });
        }
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    /// Deletes every staged path. Missing files are fine, other errors are logged only.
    pub async fn cleanup(mut self) {
        for staged in std::mem::take(&mut self.files) {
            match tokio::fs::remove_file(&staged.local_path).await {
                Ok(()) => tracing::debug!("🧹 Deleted staged file {:?}", staged.local_path),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "⚠️ Failed to delete staged {:?} file {:?}: {}",
                    staged.kind,
                    staged.local_path,
                    e
                ),
            }
        }
    }
}

impl Drop for StagingSession {
    fn drop(&mut self) {
        for staged in self.files.drain(..) {
            match std::fs::remove_file(&staged.local_path) {
                Err(e) if e.kind() != ErrorKind::NotFound => tracing::warn!(
                    "⚠️ Failed to delete abandoned staged file {:?}: {}",
                    staged.local_path,
                    e
                ),
                _ => {}
            }
        }
    }
}
