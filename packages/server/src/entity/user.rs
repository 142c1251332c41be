use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An owner of API keys and uploaded files.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: Option<String>,

    #[sea_orm(unique)]
    pub email: Option<String>,

    #[sea_orm(has_many)]
    pub api_keys: HasMany<super::api_key::Entity>,

    #[sea_orm(has_many)]
    pub files: HasMany<super::file::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
