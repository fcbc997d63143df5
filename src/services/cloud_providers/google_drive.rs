use super::{FileDescriptor, FolderProvider, ListingPage};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://drive.google.com/uc";

/// Roles that make an `anyone` permission readable without sign-in
const PUBLIC_ROLES: &[&str] = &["reader", "viewer", "writer"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct PermissionsResponse {
    #[serde(default)]
    permissions: Vec<DrivePermission>,
}

#[derive(Debug, Deserialize)]
struct DrivePermission {
    #[serde(rename = "type")]
    kind: String,
    role: String,
}

/// Google Drive v3 client for publicly shared folders, authenticated with an API key.
pub struct GoogleDriveProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    download_base: String,
    page_size: u32,
}

impl GoogleDriveProvider {
    pub fn new(api_key: Option<String>, page_size: u32) -> Self {
        Self::with_endpoints(
            api_key,
            page_size,
            DEFAULT_API_BASE.to_string(),
            DEFAULT_DOWNLOAD_BASE.to_string(),
        )
    }

    pub fn with_endpoints(
        api_key: Option<String>,
        page_size: u32,
        api_base: String,
        download_base: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_base: api_base.trim_end_matches('/').to_string(),
            download_base,
            page_size: page_size.max(1),
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Google Drive API key not configured"))
    }

    fn listing_query(folder_id: &str) -> String {
        format!(
            "'{}' in parents and trashed=false and (mimeType contains 'image/' or mimeType contains 'video/')",
            folder_id
        )
    }

    async fn has_public_permission(&self, folder_id: &str, key: &str) -> Result<bool> {
        let res = self
            .client
            .get(format!("{}/files/{}", self.api_base, folder_id))
            .query(&[("fields", "permissions"), ("key", key)])
            .send()
            .await?
            .error_for_status()?;

        let body: PermissionsResponse = res.json().await?;
        Ok(body
            .permissions
            .iter()
            .any(|p| p.kind == "anyone" && PUBLIC_ROLES.contains(&p.role.as_str())))
    }
}

/// Extracts `<id>` from links shaped like `https://drive.google.com/drive/folders/<id>?usp=sharing`.
pub fn parse_folder_id(folder_url: &str) -> Option<String> {
    let url = Url::parse(folder_url.trim()).ok()?;
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == "folders")?;
    let id = segments.next()?;

    if segments.any(|s| !s.is_empty()) {
        return None;
    }

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| id.to_string())
}

#[async_trait]
impl FolderProvider for GoogleDriveProvider {
    fn provider_id(&self) -> &'static str {
        "google_drive"
    }

    fn parse_folder_ref(&self, folder_ref: &str) -> Option<String> {
        parse_folder_id(folder_ref)
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn check_access(&self, folder_id: &str) -> Result<bool> {
        let key = self.api_key()?;

        match self.has_public_permission(folder_id, key).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => tracing::debug!("Permission lookup for folder {} failed: {}", folder_id, e),
        }

        // Permissions are often hidden from API-key callers, so probe a listing instead
        let query = format!("'{}' in parents and trashed=false", folder_id);
        let res = self
            .client
            .get(format!("{}/files", self.api_base))
            .query(&[("q", query.as_str()), ("fields", "files(id)"), ("key", key)])
            .send()
            .await?;

        Ok(res.status().is_success())
    }

    async fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<ListingPage> {
        let key = self.api_key()?;
        let query = Self::listing_query(folder_id);
        let page_size = self.page_size.to_string();

        let mut params = vec![
            ("q", query.as_str()),
            ("fields", "nextPageToken,files(id,name,mimeType)"),
            ("pageSize", page_size.as_str()),
            ("key", key),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let res = self
            .client
            .get(format!("{}/files", self.api_base))
            .query(&params)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("Drive listing failed for folder {}: {}", folder_id, e))?;

        let body: FileListResponse = res.json().await?;

        Ok(ListingPage {
            files: body
                .files
                .into_iter()
                .map(|f| FileDescriptor {
                    id: f.id,
                    name: f.name,
                    mime_type: f.mime_type,
                })
                .collect(),
            next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64> {
        let mut res = self
            .client
            .get(&self.download_base)
            .query(&[("export", "download"), ("id", file_id)])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("Drive download failed for file {}: {}", file_id, e))?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}
