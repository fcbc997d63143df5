pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;

use crate::services::ingest::IngestionService;
use crate::services::storage::StorageService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::ingest::process_drive,
        api::handlers::ingest::get_run_status,
        api::handlers::media::delete_media,
        api::handlers::upload::upload_single,
        api::handlers::upload::upload_multiple,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::ingest::ProcessDriveRequest,
            api::handlers::ingest::ProcessDriveResponse,
            api::handlers::media::DeleteMediaResponse,
            api::handlers::upload::UploadedMedia,
            api::handlers::upload::UploadSingleResponse,
            api::handlers::upload::UploadItemResult,
            api::handlers::upload::UploadMultipleResponse,
            services::ingest::types::MediaKind,
            services::ingest::RunStatus,
            services::ingest::types::RunSummary,
        )
    ),
    tags(
        (name = "ingest", description = "Folder ingestion endpoints"),
        (name = "media", description = "Ingested media management"),
        (name = "upload", description = "Direct client uploads"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub ingestion: Arc<IngestionService>,
}

pub fn create_app(state: AppState) -> Router {
    let uploads = Router::new()
        .route("/upload-single", post(api::handlers::upload::upload_single))
        .route("/upload-multiple", post(api::handlers::upload::upload_multiple))
        .layer(DefaultBodyLimit::max(
            state.ingestion.config().max_upload_bytes,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/process-drive", post(api::handlers::ingest::process_drive))
        .route("/runs/:id", get(api::handlers::ingest::get_run_status))
        .route("/media/:id", delete(api::handlers::media::delete_media))
        .merge(uploads)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
