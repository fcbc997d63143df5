use super::staging::StagingSession;
use super::types::{DerivedArtifact, MediaKind, StagedKind};
use crate::config::IngestConfig;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Longest edge of the first-pass preview
const FIRST_PASS_MAX_DIMENSION: u32 = 1600;

/// Image and video transcoding primitives used by the file processor
#[async_trait]
pub trait ArtifactDeriver: Send + Sync {
    /// Compressed preview bytes for the image at `source`
    async fn derive_image_preview(&self, source: &Path) -> Result<Vec<u8>>;

    /// Writes a short clip of `source` to `dest` and returns `dest`
    async fn derive_video_clip(
        &self,
        source: &Path,
        dest: &Path,
        duration_seconds: u32,
    ) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy)]
struct PreviewSettings {
    max_bytes: usize,
    quality: u8,
    fallback_quality: u8,
    fallback_max_dimension: u32,
}

/// Derivation backed by the `image` crate for previews and an ffmpeg subprocess for clips
pub struct MediaTranscoder {
    preview: PreviewSettings,
    clip_width: u32,
    ffmpeg_path: String,
}

impl MediaTranscoder {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            preview: PreviewSettings {
                max_bytes: config.preview_max_bytes,
                quality: config.preview_quality,
                fallback_quality: config.preview_fallback_quality,
                fallback_max_dimension: config.preview_fallback_max_dimension,
            },
            clip_width: config.preview_clip_width,
            ffmpeg_path: config.ffmpeg_path.clone(),
        }
    }
}

fn read_orientation(data: &[u8]) -> u32 {
    exif::Reader::new()
        .read_from_container(&mut std::io::Cursor::new(data))
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn bound(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() > max_dimension || img.height() > max_dimension {
        img.thumbnail(max_dimension, max_dimension)
    } else {
        img.clone()
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha and no 16-bit depth
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| anyhow!("Failed to encode JPEG preview: {}", e))?;
    }
    Ok(out)
}

/// At most two passes: the second one only when the first exceeds `max_bytes`.
fn encode_preview(data: &[u8], settings: PreviewSettings) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data).map_err(|e| anyhow!("Failed to load image: {}", e))?;
    let img = apply_orientation(img, read_orientation(data));

    let first = encode_jpeg(&bound(&img, FIRST_PASS_MAX_DIMENSION), settings.quality)?;
    if first.len() <= settings.max_bytes {
        return Ok(first);
    }

    debug!(
        "Preview pass 1 is {} KB, recompressing",
        first.len() / 1024
    );
    let second = encode_jpeg(
        &bound(&img, settings.fallback_max_dimension),
        settings.fallback_quality,
    )?;
    if second.len() > settings.max_bytes {
        warn!(
            "⚠️ Fallback preview is {} KB, still over the {} KB limit; check PREVIEW_FALLBACK_*",
            second.len() / 1024,
            settings.max_bytes / 1024
        );
    }
    Ok(second)
}

#[async_trait]
impl ArtifactDeriver for MediaTranscoder {
    async fn derive_image_preview(&self, source: &Path) -> Result<Vec<u8>> {
        let data = tokio::fs::read(source).await?;
        let settings = self.preview;

        let preview = tokio::task::spawn_blocking(move || encode_preview(&data, settings))
            .await
            .map_err(|e| anyhow!("Preview task panicked: {}", e))??;

        info!(
            "🖼️  Preview generated for {:?} ({:.2} KB)",
            source.file_name().unwrap_or_default(),
            preview.len() as f64 / 1024.0
        );
        Ok(preview)
    }

    async fn derive_video_clip(
        &self,
        source: &Path,
        dest: &Path,
        duration_seconds: u32,
    ) -> Result<PathBuf> {
        let started = std::time::Instant::now();

        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-ss")
            .arg("0")
            .arg("-i")
            .arg(source.as_os_str())
            .arg("-t")
            .arg(duration_seconds.to_string())
            .arg("-c:v")
            .arg("libx264")
            .arg("-crf")
            .arg("28")
            .arg("-preset")
            .arg("veryfast")
            .arg("-movflags")
            .arg("+faststart")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-an")
            .arg("-vf")
            .arg(format!("scale={}:-2", self.clip_width)) // fixed width, even auto height
            .arg(dest.as_os_str())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("Failed to run {}: {}", self.ffmpeg_path, e))?;

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            let tail: String = err_msg
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            error!("ffmpeg failed after {:?}: {}", started.elapsed(), tail);
            return Err(anyhow!("ffmpeg failed: {}", tail));
        }

        info!(
            "🎬 Clip generated for {:?} in {:.2}s",
            source.file_name().unwrap_or_default(),
            started.elapsed().as_secs_f64()
        );
        Ok(dest.to_path_buf())
    }
}

fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(name)
}

/// Derives the preview (image) or clip (video) for a staged original and registers
/// the output path with the session before anything is written to it.
pub async fn derive_artifact(
    deriver: &dyn ArtifactDeriver,
    kind: MediaKind,
    source: &Path,
    staged_name: &str,
    session: &mut StagingSession,
    clip_seconds: u32,
) -> Result<DerivedArtifact> {
    match kind {
        MediaKind::Image => {
            let file_name = format!("thumb_{}.jpg", stem(staged_name));
            let path = session.register(StagedKind::DerivedThumbnail, &file_name);
            let bytes = deriver.derive_image_preview(source).await?;
            tokio::fs::write(&path, bytes).await?;
            Ok(DerivedArtifact {
                path,
                file_name,
                content_type: mime::IMAGE_JPEG.to_string(),
            })
        }
        MediaKind::Video => {
            let file_name = format!("clip_{}.mp4", stem(staged_name));
            let dest = session.register(StagedKind::DerivedClip, &file_name);
            let path = deriver.derive_video_clip(source, &dest, clip_seconds).await?;
            if path != dest {
                session.track(StagedKind::DerivedClip, path.clone());
            }
            Ok(DerivedArtifact {
                path,
                file_name,
                content_type: "video/mp4".to_string(),
            })
        }
    }
}
