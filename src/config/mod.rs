use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the folder ingestion pipeline
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum number of file processors in flight per run (default: 10)
    pub max_concurrent: usize,

    /// Full workflow attempts per file before it is counted as failed (default: 3)
    pub max_retries: u32,

    /// Length of the derived video clip in seconds (default: 3)
    pub preview_clip_seconds: u32,

    /// Pixel width the video clip is scaled to, height keeps the aspect (default: 640)
    pub preview_clip_width: u32,

    /// Byte ceiling for image previews (default: 100 KiB)
    pub preview_max_bytes: usize,

    /// JPEG quality of the first preview pass (default: 75)
    pub preview_quality: u8,

    /// JPEG quality of the second, more aggressive pass (default: 30)
    pub preview_fallback_quality: u8,

    /// Longest edge of the second-pass preview in pixels (default: 360)
    pub preview_fallback_max_dimension: u32,

    /// Shared directory for staged downloads and derived artifacts
    pub staging_dir: PathBuf,

    /// Descriptors requested per listing page (default: 100)
    pub listing_page_size: u32,

    /// Deadline for one workflow attempt (default: 600s)
    pub attempt_timeout: Duration,

    /// Optional deadline for a whole run
    pub run_timeout: Option<Duration>,

    /// ffmpeg binary used for clip extraction (default: "ffmpeg")
    pub ffmpeg_path: String,

    /// Files accepted by one multi-file upload request (default: 10)
    pub max_upload_files: usize,

    /// Request body ceiling for client uploads (default: 200 MiB)
    pub max_upload_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_retries: 3,
            preview_clip_seconds: 3,
            preview_clip_width: 640,
            preview_max_bytes: 100 * 1024, // 100 KiB
            preview_quality: 75,
            preview_fallback_quality: 30,
            preview_fallback_max_dimension: 360,
            staging_dir: env::temp_dir().join("drive-media-ingest"),
            listing_page_size: 100,
            attempt_timeout: Duration::from_secs(600),
            run_timeout: None,
            ffmpeg_path: "ffmpeg".to_string(),
            max_upload_files: 10,
            max_upload_bytes: 200 * 1024 * 1024, // 200 MiB
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_concurrent: parse_var::<usize>("MAX_CONCURRENT")
                .unwrap_or(default.max_concurrent)
                .max(1),

            max_retries: parse_var::<u32>("MAX_RETRIES")
                .unwrap_or(default.max_retries)
                .max(1),

            preview_clip_seconds: parse_var("PREVIEW_CLIP_SECONDS")
                .unwrap_or(default.preview_clip_seconds),

            preview_clip_width: parse_var("PREVIEW_CLIP_WIDTH")
                .unwrap_or(default.preview_clip_width),

            preview_max_bytes: parse_var("PREVIEW_MAX_BYTES").unwrap_or(default.preview_max_bytes),

            preview_quality: parse_var("PREVIEW_QUALITY").unwrap_or(default.preview_quality),

            preview_fallback_quality: parse_var("PREVIEW_FALLBACK_QUALITY")
                .unwrap_or(default.preview_fallback_quality),

            preview_fallback_max_dimension: parse_var("PREVIEW_FALLBACK_MAX_DIMENSION")
                .unwrap_or(default.preview_fallback_max_dimension),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            listing_page_size: parse_var("LISTING_PAGE_SIZE").unwrap_or(default.listing_page_size),

            attempt_timeout: parse_var::<u64>("ATTEMPT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.attempt_timeout),

            run_timeout: parse_var::<u64>("RUN_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),

            max_upload_files: parse_var::<usize>("UPLOAD_MAX_FILES")
                .unwrap_or(default.max_upload_files)
                .max(1),

            max_upload_bytes: parse_var("UPLOAD_MAX_BYTES").unwrap_or(default.max_upload_bytes),
        }
    }

    /// Small limits for tests and local runs against a scratch directory
    pub fn development(staging_dir: PathBuf) -> Self {
        Self {
            max_concurrent: 2,
            staging_dir,
            attempt_timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }
}
