use crate::AppState;
use crate::api::error::AppError;
use crate::entities::prelude::MediaRecords;
use axum::{
    Json,
    extract::{Path, State},
};
use sea_orm::{EntityTrait, ModelTrait};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct DeleteMediaResponse {
    pub message: String,
    pub deleted_objects: usize,
}

/// Removes the stored objects of a media record, then the record itself.
/// Objects already missing from the bucket are skipped.
#[utoipa::path(
    delete,
    path = "/media/{id}",
    params(
        ("id" = String, Path, description = "Media record id")
    ),
    responses(
        (status = 200, description = "Media deleted", body = DeleteMediaResponse),
        (status = 404, description = "Media not found")
    ),
    tag = "media"
)]
pub async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteMediaResponse>, AppError> {
    let record = MediaRecords::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Media not found".to_string()))?;

    let mut keys = Vec::new();
    for key in std::iter::once(record.original_key.clone()).chain(record.preview_key.clone()) {
        if state.storage.file_exists(&key).await? {
            keys.push(key);
        } else {
            tracing::warn!("⚠️ Object {} of media {} already gone", key, record.id);
        }
    }

    let record_id = record.id.clone();
    state.storage.delete_objects(&keys).await?;
    record.delete(&state.db).await?;

    tracing::info!("🗑️ Media {} deleted ({} objects)", record_id, keys.len());
    Ok(Json(DeleteMediaResponse {
        message: "Media deleted successfully".to_string(),
        deleted_objects: keys.len(),
    }))
}
