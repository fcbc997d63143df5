use crate::services::storage::S3StorageService;
use anyhow::anyhow;
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage() -> anyhow::Result<Arc<S3StorageService>> {
    let bucket = env::var("S3_BUCKET").map_err(|_| anyhow!("S3_BUCKET must be set"))?;
    let access_key = env::var("S3_ACCESS_KEY").map_err(|_| anyhow!("S3_ACCESS_KEY must be set"))?;
    let secret_key = env::var("S3_SECRET_KEY").map_err(|_| anyhow!("S3_SECRET_KEY must be set"))?;
    let region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    // MinIO and other S3-compatible stores need an explicit endpoint
    let endpoint_url = env::var("S3_ENDPOINT").ok();

    let public_base_url = env::var("S3_PUBLIC_BASE_URL").unwrap_or_else(|_| match &endpoint_url {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    });

    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        endpoint_url.as_deref().unwrap_or("aws"),
        bucket
    );

    let mut loader = aws_config::from_env()
        .region(Region::new(region))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ));
    if let Some(endpoint) = &endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(endpoint_url.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(e) => tracing::warn!("⚠️ Bucket '{}' is not reachable yet: {}", bucket, e),
    }

    Ok(Arc::new(S3StorageService::new(
        s3_client,
        bucket,
        public_base_url,
    )))
}
