use crate::config::IngestConfig;
use crate::services::cloud_providers::google_drive::{
    DEFAULT_API_BASE, DEFAULT_DOWNLOAD_BASE, GoogleDriveProvider,
};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

pub fn setup_drive(config: &IngestConfig) -> Arc<GoogleDriveProvider> {
    let api_key = env::var("GOOGLE_DRIVE_API_KEY").ok();
    let api_base = env::var("GOOGLE_DRIVE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    let download_base =
        env::var("GOOGLE_DRIVE_DOWNLOAD_BASE").unwrap_or_else(|_| DEFAULT_DOWNLOAD_BASE.to_string());

    if api_key.is_none() {
        warn!("⚠️ GOOGLE_DRIVE_API_KEY is not set; ingestion requests will be rejected");
    }
    info!("📂 Google Drive API: {}", api_base);

    Arc::new(GoogleDriveProvider::with_endpoints(
        api_key,
        config.listing_page_size,
        api_base,
        download_base,
    ))
}
