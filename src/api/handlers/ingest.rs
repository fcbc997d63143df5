use crate::AppState;
use crate::api::error::AppError;
use crate::services::ingest::RunStatus;
use crate::services::ingest::types::OwnerContext;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct ProcessDriveRequest {
    #[validate(length(min = 1, message = "folder_url is required"))]
    pub folder_url: String,
    #[validate(length(min = 1, max = 64, message = "order_id is required"))]
    pub order_id: String,
    #[validate(length(min = 1, max = 128, message = "owner_id is required"))]
    pub owner_id: String,
    /// Free-form owner tag stored on every object (e.g. a phone number)
    #[validate(length(max = 128))]
    pub owner_label: Option<String>,
    pub parent_folder_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProcessDriveResponse {
    pub message: String,
    pub run_id: String,
    pub folder_id: String,
}

#[utoipa::path(
    post,
    path = "/process-drive",
    request_body = ProcessDriveRequest,
    responses(
        (status = 202, description = "Folder accepted, processing started", body = ProcessDriveResponse),
        (status = 400, description = "Missing fields or malformed folder link"),
        (status = 422, description = "Folder is not publicly accessible")
    ),
    tag = "ingest"
)]
pub async fn process_drive(
    State(state): State<AppState>,
    Json(req): Json<ProcessDriveRequest>,
) -> Result<(StatusCode, Json<ProcessDriveResponse>), AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let owner = OwnerContext {
        order_id: req.order_id.trim().to_string(),
        owner_id: req.owner_id.trim().to_string(),
        owner_label: req.owner_label.unwrap_or_default().trim().to_string(),
        parent_folder_id: req.parent_folder_id.filter(|id| !id.trim().is_empty()),
    };

    let handle = state.ingestion.spawn(&req.folder_url, owner).await?;
    tracing::info!(
        "📥 Run {} started for folder {}",
        handle.run_id,
        handle.folder_id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessDriveResponse {
            message: "Processing started".to_string(),
            run_id: handle.run_id,
            folder_id: handle.folder_id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/runs/{id}",
    params(
        ("id" = String, Path, description = "Run id returned by /process-drive")
    ),
    responses(
        (status = 200, description = "Run status", body = RunStatus),
        (status = 404, description = "Unknown run")
    ),
    tag = "ingest"
)]
pub async fn get_run_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatus>, AppError> {
    state
        .ingestion
        .run_status(&run_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Run not found".to_string()))
}
