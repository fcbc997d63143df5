use super::types::NewMediaRecord;
use crate::entities::media_records;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use uuid::Uuid;

/// Persists one metadata record per processed file and returns its id
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn create_record(&self, record: NewMediaRecord) -> Result<String>;
}

pub struct SeaOrmRecordWriter {
    db: DatabaseConnection,
}

impl SeaOrmRecordWriter {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordWriter for SeaOrmRecordWriter {
    async fn create_record(&self, record: NewMediaRecord) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        let model = media_records::ActiveModel {
            id: Set(id.clone()),
            order_id: Set(record.order_id),
            owner_id: Set(record.owner_id),
            owner_label: Set(record.owner_label),
            media_type: Set(record.media_type.as_str().to_string()),
            original_url: Set(record.original_url),
            original_key: Set(record.original_key),
            preview_url: Set(record.preview_url),
            preview_key: Set(record.preview_key),
            parent_folder_id: Set(record.parent_folder_id),
            created_at: Set(Utc::now()),
        };
        model.insert(&self.db).await?;

        Ok(id)
    }
}
