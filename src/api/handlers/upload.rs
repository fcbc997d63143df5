use crate::AppState;
use crate::api::error::AppError;
use crate::services::ingest::store::StoredMedia;
use crate::services::ingest::types::{MediaKind, OwnerContext};
use crate::services::ingest::upload::{UploadBatch, UploadOutcome};
use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
    http::StatusCode,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

/// Text fields sent next to the files
#[derive(Debug, Default, Validate)]
struct UploadForm {
    #[validate(length(min = 1, max = 64, message = "order_id is required"))]
    order_id: String,
    #[validate(length(min = 1, max = 128, message = "owner_id is required"))]
    owner_id: String,
    #[validate(length(max = 128))]
    owner_label: Option<String>,
    parent_folder_id: Option<String>,
}

impl UploadForm {
    fn into_owner(self) -> OwnerContext {
        OwnerContext {
            order_id: self.order_id,
            owner_id: self.owner_id,
            owner_label: self.owner_label.unwrap_or_default(),
            parent_folder_id: self.parent_folder_id,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadedMedia {
    pub file_name: String,
    pub record_id: String,
    pub media_type: MediaKind,
    pub file_url: String,
    pub file_key: String,
    pub preview_url: String,
    pub preview_key: String,
}

impl UploadedMedia {
    fn new(file_name: String, stored: StoredMedia) -> Self {
        Self {
            file_name,
            record_id: stored.record_id,
            media_type: stored.kind,
            file_url: stored.original.location,
            file_key: stored.original.key,
            preview_url: stored.preview.location,
            preview_key: stored.preview.key,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadSingleResponse {
    pub message: String,
    pub file: UploadedMedia,
}

#[derive(Serialize, ToSchema)]
pub struct UploadItemResult {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<UploadedMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadMultipleResponse {
    /// False when at least one file failed
    pub success: bool,
    pub total: usize,
    pub stored: usize,
    pub images: Vec<UploadItemResult>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

async fn text(field: Field<'_>) -> Result<Option<String>, AppError> {
    let value = field.text().await.map_err(multipart_error)?;
    let value = value.trim();
    Ok((!value.is_empty() && value != "null").then(|| value.to_string()))
}

async fn read_fields(
    state: &AppState,
    multipart: &mut Multipart,
    file_field: &str,
    max_files: usize,
) -> Result<(UploadForm, UploadBatch), AppError> {
    let mut form = UploadForm::default();
    let mut batch = state.ingestion.upload_batch();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == file_field {
            if batch.len() >= max_files {
                return Err(AppError::BadRequest(format!(
                    "At most {} file(s) per request",
                    max_files
                )));
            }
            let file_name = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            batch
                .stage(&file_name, &content_type, Box::pin(field))
                .await
                .map_err(|e| {
                    let err_msg = e.to_string();
                    if err_msg.contains("length limit exceeded") {
                        AppError::PayloadTooLarge(
                            "Request body exceeds the maximum allowed limit".to_string(),
                        )
                    } else {
                        AppError::BadRequest(format!("Could not receive {}: {}", file_name, err_msg))
                    }
                })?;
            continue;
        }

        match name.as_str() {
            "order_id" => form.order_id = text(field).await?.unwrap_or_default(),
            "owner_id" => form.owner_id = text(field).await?.unwrap_or_default(),
            "owner_label" => form.owner_label = text(field).await?,
            "parent_folder_id" => form.parent_folder_id = text(field).await?,
            _ => {}
        }
    }

    Ok((form, batch))
}

/// Reads the whole request: staged files plus a validated owner.
/// Staged files are removed again when anything is rejected.
async fn read_upload(
    state: &AppState,
    multipart: &mut Multipart,
    file_field: &str,
    max_files: usize,
) -> Result<(OwnerContext, UploadBatch), AppError> {
    let result = async {
        let (form, batch) = read_fields(state, multipart, file_field, max_files).await?;
        if batch.is_empty() {
            return Err(AppError::BadRequest("No file was uploaded".to_string()));
        }
        form
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok::<_, AppError>((form.into_owner(), batch))
    }
    .await;

    if let Err(e) = &result {
        // Drain what is left so the client sees the response instead of a reset
        tracing::warn!("Upload rejected: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
    }
    result
}

#[utoipa::path(
    post,
    path = "/upload-single",
    request_body(content = Multipart, description = "One `file` part plus order_id, owner_id, owner_label, parent_folder_id"),
    responses(
        (status = 201, description = "File stored", body = UploadSingleResponse),
        (status = 400, description = "Missing file or fields"),
        (status = 413, description = "Request body too large"),
        (status = 422, description = "File is not a decodable image or video")
    ),
    tag = "upload"
)]
pub async fn upload_single(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadSingleResponse>), AppError> {
    let (owner, batch) = read_upload(&state, &mut multipart, "file", 1).await?;

    let UploadOutcome { file_name, result } = state
        .ingestion
        .store_uploads(batch, &owner)
        .await
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Upload produced no outcome".to_string()))?;
    let stored = result?;

    Ok((
        StatusCode::CREATED,
        Json(UploadSingleResponse {
            message: "File uploaded successfully.".to_string(),
            file: UploadedMedia::new(file_name, stored),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/upload-multiple",
    request_body(content = Multipart, description = "Up to UPLOAD_MAX_FILES `images` parts plus order_id, owner_id, owner_label, parent_folder_id"),
    responses(
        (status = 200, description = "Per-file results", body = UploadMultipleResponse),
        (status = 400, description = "Missing files, too many files or missing fields"),
        (status = 413, description = "Request body too large")
    ),
    tag = "upload"
)]
pub async fn upload_multiple(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadMultipleResponse>, AppError> {
    let max_files = state.ingestion.config().max_upload_files;
    let (owner, batch) = read_upload(&state, &mut multipart, "images", max_files).await?;

    let images: Vec<UploadItemResult> = state
        .ingestion
        .store_uploads(batch, &owner)
        .await
        .into_iter()
        .map(|UploadOutcome { file_name, result }| match result {
            Ok(stored) => UploadItemResult {
                file_name: file_name.clone(),
                media: Some(UploadedMedia::new(file_name, stored)),
                error: None,
            },
            Err(e) => UploadItemResult {
                file_name,
                media: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let stored = images.iter().filter(|item| item.media.is_some()).count();
    Ok(Json(UploadMultipleResponse {
        success: stored == images.len(),
        total: images.len(),
        stored,
        images,
    }))
}
