use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    TransactionTrait,
};
use tracing::debug;

use super::{NewFile, RecordStore};
use crate::entity::{api_key, file};

/// [`RecordStore`] backed by a sea-orm connection pool.
#[derive(Clone)]
pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn find_api_key(&self, key: &str) -> Result<Option<api_key::Model>, DbErr> {
        api_key::Entity::find()
            .filter(api_key::Column::Key.eq(key))
            .one(&self.db)
            .await
    }

    async fn create_file(&self, file: NewFile) -> Result<file::Model, DbErr> {
        file.into_active_model(Utc::now()).insert(&self.db).await
    }

    async fn create_files(&self, files: Vec<NewFile>) -> Result<Vec<file::Model>, DbErr> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let mut created = Vec::with_capacity(files.len());
        for new_file in files {
            // An error here drops `txn`, which rolls back earlier inserts.
            created.push(new_file.into_active_model(now).insert(&txn).await?);
        }

        txn.commit().await?;
        debug!(count = created.len(), "Committed file records");
        Ok(created)
    }
}
