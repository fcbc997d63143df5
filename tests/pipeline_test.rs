mod common;

use common::{
    MockDeriver, MockProvider, MockStorageService, image, setup_test_db, staged_file_count, video,
};
use drive_media_ingest::config::IngestConfig;
use drive_media_ingest::entities::{media_records, prelude::*};
use drive_media_ingest::services::ingest::IngestionService;
use drive_media_ingest::services::ingest::error::IngestError;
use drive_media_ingest::services::ingest::processor::{FileProcessor, ProcessFile};
use drive_media_ingest::services::ingest::record_writer::SeaOrmRecordWriter;
use drive_media_ingest::services::ingest::staging::StagingArea;
use drive_media_ingest::services::ingest::store::MediaStore;
use drive_media_ingest::services::ingest::types::{FileOutcome, OwnerContext};
use drive_media_ingest::services::ingest::uploader::{OWNER_METADATA_KEY, Uploader};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FOLDER_URL: &str = "https://drive.google.com/drive/folders/1AbCdEfGhIjK?usp=sharing";

fn owner() -> OwnerContext {
    OwnerContext {
        order_id: "1042".to_string(),
        owner_id: "cust-7".to_string(),
        owner_label: "5551234".to_string(),
        parent_folder_id: Some("parent-1".to_string()),
    }
}

struct Harness {
    _tmp: TempDir,
    config: IngestConfig,
    db: DatabaseConnection,
    provider: Arc<MockProvider>,
    storage: Arc<MockStorageService>,
}

impl Harness {
    async fn new(provider: MockProvider, storage: MockStorageService) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = IngestConfig::development(tmp.path().join("staging"));
        Self {
            _tmp: tmp,
            config,
            db: setup_test_db().await,
            provider: Arc::new(provider),
            storage: Arc::new(storage),
        }
    }

    fn service(&self) -> IngestionService {
        self.service_with(Arc::new(MockDeriver::new()))
    }

    fn service_with(&self, deriver: Arc<MockDeriver>) -> IngestionService {
        IngestionService::new(
            self.config.clone(),
            self.provider.clone(),
            self.storage.clone(),
            deriver,
            Arc::new(SeaOrmRecordWriter::new(self.db.clone())),
        )
    }

    fn processor(&self, deriver: MockDeriver) -> FileProcessor {
        let store = MediaStore::new(
            Arc::new(deriver),
            Uploader::new(self.storage.clone()),
            Arc::new(SeaOrmRecordWriter::new(self.db.clone())),
            self.config.preview_clip_seconds,
        );
        FileProcessor::new(
            &self.config,
            self.provider.clone(),
            Arc::new(store),
            StagingArea::new(self.config.staging_dir.clone()),
        )
    }

    async fn record_count(&self) -> u64 {
        MediaRecords::find().count(&self.db).await.unwrap()
    }
}

#[tokio::test]
async fn test_three_images_all_complete() {
    let provider = MockProvider::new(vec![vec![
        image("f1", "a.jpg"),
        image("f2", "b.jpg"),
        image("f3", "c.jpg"),
    ]]);
    let h = Harness::new(provider, MockStorageService::new()).await;

    let summary = h.service().run_ingestion(FOLDER_URL, owner()).await.unwrap();

    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.listing_error.is_none());
    assert!(summary.peak_active <= 2);
    assert_eq!(h.record_count().await, 3);
    // original + preview per file
    assert_eq!(h.storage.keys().len(), 6);
    assert_eq!(staged_file_count(&h.config.staging_dir), 0);
}

#[tokio::test]
async fn test_record_points_at_both_uploaded_objects() {
    let provider = MockProvider::new(vec![vec![image("f1", "Holiday Photo.jpg")]]);
    let h = Harness::new(provider, MockStorageService::new()).await;

    h.service().run_ingestion(FOLDER_URL, owner()).await.unwrap();

    let record = MediaRecords::find().one(&h.db).await.unwrap().unwrap();
    assert_eq!(record.order_id, "1042");
    assert_eq!(record.owner_id, "cust-7");
    assert_eq!(record.media_type, "image");
    assert_eq!(record.parent_folder_id.as_deref(), Some("parent-1"));
    assert!(record.original_key.starts_with("1042_cust-7_5551234/"));
    assert!(record.original_key.ends_with("_Holiday Photo.jpg"));

    let preview_key = record.preview_key.clone().unwrap();
    assert!(preview_key.starts_with("1042_cust-7_5551234/thumb_"));
    assert!(preview_key.ends_with(".jpg"));
    assert_eq!(
        record.preview_url.as_deref(),
        Some(format!("https://blobs.test/{}", preview_key).as_str())
    );

    let objects = h.storage.objects.lock().unwrap();
    let (_, content_type, metadata) = objects.get(&record.original_key).unwrap();
    assert_eq!(content_type, "image/jpeg");
    assert_eq!(metadata.get(OWNER_METADATA_KEY).map(String::as_str), Some("5551234"));
    let (_, preview_type, _) = objects.get(&preview_key).unwrap();
    assert_eq!(preview_type, "image/jpeg");
}

#[tokio::test]
async fn test_video_gets_clip_preview() {
    let provider = MockProvider::new(vec![vec![video("v1", "walkthrough.mov")]]);
    let h = Harness::new(provider, MockStorageService::new()).await;

    let summary = h.service().run_ingestion(FOLDER_URL, owner()).await.unwrap();
    assert_eq!(summary.completed, 1);

    let record = MediaRecords::find().one(&h.db).await.unwrap().unwrap();
    assert_eq!(record.media_type, "video");
    let preview_key = record.preview_key.unwrap();
    assert!(preview_key.contains("/clip_"));
    assert!(preview_key.ends_with("_walkthrough.mp4"));

    let objects = h.storage.objects.lock().unwrap();
    let (clip, content_type, _) = objects.get(&preview_key).unwrap();
    assert_eq!(content_type, "video/mp4");
    assert_eq!(clip, b"3s clip");
}

#[tokio::test]
async fn test_upload_recovers_on_third_attempt() {
    let provider = MockProvider::new(vec![vec![
        image("f1", "a.jpg"),
        image("f2", "b.jpg"),
        image("f3", "c.jpg"),
    ]]);
    // Only the original of b.jpg fails, twice
    let storage = MockStorageService::failing(
        |key| key.ends_with("_b.jpg") && !key.contains("/thumb_"),
        2,
    );
    let h = Harness::new(provider, storage).await;

    let summary = h.service().run_ingestion(FOLDER_URL, owner()).await.unwrap();

    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(h.provider.download_count("f2"), 3);
    assert_eq!(h.provider.download_count("f1"), 1);
    assert_eq!(h.record_count().await, 3);

    let b_records = MediaRecords::find()
        .filter(media_records::Column::OriginalKey.like("%_b.jpg"))
        .count(&h.db)
        .await
        .unwrap();
    assert_eq!(b_records, 1);
    assert_eq!(staged_file_count(&h.config.staging_dir), 0);
}

#[tokio::test]
async fn test_persistent_upload_failure_fails_only_that_file() {
    let provider = MockProvider::new(vec![vec![
        image("f1", "a.jpg"),
        image("f2", "b.jpg"),
        image("f3", "c.jpg"),
    ]]);
    let storage = MockStorageService::failing(
        |key| key.ends_with("_b.jpg") && !key.contains("/thumb_"),
        u32::MAX,
    );
    let h = Harness::new(provider, storage).await;

    let summary = h.service().run_ingestion(FOLDER_URL, owner()).await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(h.provider.download_count("f2"), 3);
    assert_eq!(h.record_count().await, 2);

    let b_records = MediaRecords::find()
        .filter(media_records::Column::OriginalKey.like("%_b.jpg"))
        .count(&h.db)
        .await
        .unwrap();
    assert_eq!(b_records, 0);
    assert_eq!(staged_file_count(&h.config.staging_dir), 0);
}

#[tokio::test]
async fn test_download_failure_is_retried() {
    let provider = MockProvider::new(vec![vec![image("f1", "a.jpg")]]).fail_downloads("f1", 1);
    let h = Harness::new(provider, MockStorageService::new()).await;

    let processor = h.processor(MockDeriver::new());

    let outcome = processor.process(image("f1", "a.jpg"), &owner()).await;

    match outcome {
        FileOutcome::Completed { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(h.provider.download_count("f1"), 2);
    assert_eq!(h.record_count().await, 1);
}

#[tokio::test]
async fn test_attempt_timeout_exhausts_retries_and_cleans_up() {
    let provider = MockProvider::new(vec![vec![image("f1", "slow.jpg")]]);
    let mut h = Harness::new(provider, MockStorageService::new()).await;
    h.config.attempt_timeout = Duration::from_millis(50);

    let processor = h.processor(MockDeriver::slow(Duration::from_secs(5)));

    let outcome = processor.process(image("f1", "slow.jpg"), &owner()).await;

    match outcome {
        FileOutcome::Failed { error, attempts } => {
            assert_eq!(attempts, 3);
            assert!(error.contains("timed out"), "unexpected error: {}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.provider.download_count("f1"), 3);
    assert_eq!(h.record_count().await, 0);
    assert!(h.storage.keys().is_empty());
    assert_eq!(staged_file_count(&h.config.staging_dir), 0);
}

#[tokio::test]
async fn test_run_deadline_aborts_attempts_and_removes_staged_files() {
    let provider = MockProvider::new(vec![vec![
        image("f1", "a.jpg"),
        video("v1", "b.mov"),
        image("f3", "c.jpg"),
        image("f4", "d.jpg"),
    ]]);
    let mut h = Harness::new(provider, MockStorageService::new()).await;
    h.config.run_timeout = Some(Duration::from_millis(100));

    let service = h.service_with(Arc::new(MockDeriver::slow(Duration::from_secs(5))));
    let summary = service.run_ingestion(FOLDER_URL, owner()).await.unwrap();

    assert!(summary.timed_out);
    assert_eq!(summary.completed, 0);
    // max_concurrent is 2 in the development config
    assert_eq!(summary.failed, 2);
    // both in-flight attempts got as far as downloading
    assert_eq!(h.provider.download_count("f1"), 1);
    assert_eq!(h.provider.download_count("v1"), 1);
    assert_eq!(h.provider.download_count("f3"), 0);
    assert_eq!(h.record_count().await, 0);
    assert!(h.storage.keys().is_empty());
    assert_eq!(staged_file_count(&h.config.staging_dir), 0);
}

#[tokio::test]
async fn test_empty_folder_completes_with_nothing_processed() {
    let h = Harness::new(MockProvider::new(vec![vec![]]), MockStorageService::new()).await;

    let summary = h.service().run_ingestion(FOLDER_URL, owner()).await.unwrap();

    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(h.record_count().await, 0);
}

#[tokio::test]
async fn test_invalid_link_processes_nothing() {
    let h = Harness::new(
        MockProvider::new(vec![vec![image("f1", "a.jpg")]]),
        MockStorageService::new(),
    )
    .await;

    let err = h
        .service()
        .run_ingestion("https://example.com/not-a-drive-link", owner())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::InvalidFolderReference(_)));
    assert_eq!(h.provider.download_count("f1"), 0);
    assert!(h.provider.page_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_inaccessible_folder_processes_nothing() {
    let h = Harness::new(
        MockProvider::new(vec![vec![image("f1", "a.jpg")]]).inaccessible(),
        MockStorageService::new(),
    )
    .await;

    let err = h
        .service()
        .run_ingestion(FOLDER_URL, owner())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::FolderNotAccessible(ref id) if id == "1AbCdEfGhIjK"));
    assert!(h.provider.page_requests.lock().unwrap().is_empty());
    assert_eq!(h.record_count().await, 0);
}

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let h = Harness::new(
        MockProvider::new(vec![vec![image("f1", "a.jpg")]]).without_credentials(),
        MockStorageService::new(),
    )
    .await;

    let err = h
        .service()
        .run_ingestion(FOLDER_URL, owner())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::MissingApiKey));
}

#[tokio::test]
async fn test_spawned_run_reports_finished_status() {
    let provider = MockProvider::new(vec![vec![image("f1", "a.jpg"), video("v1", "b.mp4")]]);
    let h = Harness::new(provider, MockStorageService::new()).await;
    let service = h.service();

    let handle = service.spawn(FOLDER_URL, owner()).await.unwrap();
    assert_eq!(handle.folder_id, "1AbCdEfGhIjK");
    assert!(service.run_status(&handle.run_id).is_some());

    let run_id = handle.run_id.clone();
    let summary = handle.join.await.unwrap();
    assert_eq!(summary.completed, 2);

    let status = serde_json::to_value(service.run_status(&run_id).unwrap()).unwrap();
    assert_eq!(status["state"], "finished");
    assert_eq!(status["summary"]["completed"], 2);
    assert!(service.run_status("unknown-run").is_none());
}
