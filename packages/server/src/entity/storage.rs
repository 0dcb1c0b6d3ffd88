use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-owner quota ledger.
///
/// `files_count` and `files_size` are denormalized aggregates over the
/// owner's `file` rows. Only `accounting::ledger` writes them.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id", on_delete = "Cascade")]
    pub owner: HasOne<super::user::Entity>,

    pub files_count: i64,
    /// In bytes.
    pub files_size: i64,

    #[sea_orm(has_many)]
    pub files: HasMany<super::file::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
