use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ingested file: the original object, its preview object and who it belongs to.
/// Rows are written once and never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(indexed)]
    pub order_id: String,
    #[sea_orm(indexed)]
    pub owner_id: String,
    pub owner_label: String,
    /// "image" or "video"
    pub media_type: String,
    pub original_url: String,
    #[sea_orm(unique)]
    pub original_key: String,
    pub preview_url: Option<String>,
    pub preview_key: Option<String>,
    #[sea_orm(indexed)]
    pub parent_folder_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
