use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "storage_path_name")]
    pub storage_id: i32,
    #[sea_orm(belongs_to, from = "storage_id", to = "id", on_delete = "Cascade")]
    pub storage: HasOne<super::storage::Entity>,

    /// `""` for the root, otherwise `a/b/` form.
    #[sea_orm(unique_key = "storage_path_name")]
    pub path: String,
    /// Display name; the last component of `location`.
    #[sea_orm(unique_key = "storage_path_name")]
    pub name: String,
    /// Filename as sent by the client.
    pub origin_name: String,

    #[sea_orm(unique)]
    pub public_id: Uuid,

    pub content_type: String,
    pub size: i64,
    /// Lowercase hex SHA-256.
    pub content_hash: String,
    /// Blob location relative to the storage root.
    pub location: String,

    #[sea_orm(column_type = "Text")]
    pub note: String,

    pub last_download: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
