use clap::Parser;
use dotenvy::dotenv;
use drive_media_ingest::config::IngestConfig;
use drive_media_ingest::infrastructure::{database, drive, storage};
use drive_media_ingest::services::ingest::IngestionService;
use drive_media_ingest::services::ingest::deriver::MediaTranscoder;
use drive_media_ingest::services::ingest::record_writer::SeaOrmRecordWriter;
use drive_media_ingest::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 4000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & Logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drive_media_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Drive Media Ingest...");

    // 2. Infrastructure
    let db = database::setup_database().await?;
    let storage_service = storage::setup_storage().await?;

    let ingest_config = IngestConfig::from_env();
    info!(
        "⚙️  Ingest Config: Concurrency={}, Retries={}, Clip={}s, Staging={:?}",
        ingest_config.max_concurrent,
        ingest_config.max_retries,
        ingest_config.preview_clip_seconds,
        ingest_config.staging_dir
    );

    let provider = drive::setup_drive(&ingest_config);

    // 3. Pipeline
    let ingestion = Arc::new(IngestionService::new(
        ingest_config.clone(),
        provider,
        storage_service.clone(),
        Arc::new(MediaTranscoder::new(&ingest_config)),
        Arc::new(SeaOrmRecordWriter::new(db.clone())),
    ));

    let state = AppState {
        db,
        storage: storage_service,
        ingestion,
    };

    // 4. API
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("👋 Drive Media Ingest exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
