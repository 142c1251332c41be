use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Filename as sent by the client.
    pub original_name: String,

    /// Generated `<uuid-v7>.<ext>` name on disk.
    pub file_name: String,

    pub size: i64,

    pub mime_type: String,

    /// API key the upload was made with.
    pub app_key: String,

    /// Public URL, `/storage/{shard}/{file_name}`.
    pub url: String,

    #[sea_orm(indexed)]
    pub created_by_id: i32,
    #[sea_orm(belongs_to, from = "created_by_id", to = "id")]
    pub created_by: HasOne<super::user::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
