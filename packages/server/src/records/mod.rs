//! Record store seam between the ingestion pipeline and the database.

mod sea;

pub use sea::SeaOrmRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DbErr, Set};

use crate::entity::{api_key, file};

/// Metadata for one stored blob, before it has a row id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFile {
    pub original_name: String,
    pub file_name: String,
    pub size: i64,
    pub mime_type: String,
    pub app_key: String,
    pub url: String,
    pub created_by_id: i32,
}

impl NewFile {
    pub fn into_active_model(self, created_at: DateTime<Utc>) -> file::ActiveModel {
        file::ActiveModel {
            original_name: Set(self.original_name),
            file_name: Set(self.file_name),
            size: Set(self.size),
            mime_type: Set(self.mime_type),
            app_key: Set(self.app_key),
            url: Set(self.url),
            created_by_id: Set(self.created_by_id),
            created_at: Set(created_at),
            ..Default::default()
        }
    }
}

/// The persistence operations the upload pipeline needs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact-match lookup of an issued API key.
    async fn find_api_key(&self, key: &str) -> Result<Option<api_key::Model>, DbErr>;

    /// Insert one file record.
    async fn create_file(&self, file: NewFile) -> Result<file::Model, DbErr>;

    /// Insert every record or none of them.
    async fn create_files(&self, files: Vec<NewFile>) -> Result<Vec<file::Model>, DbErr>;
}
