use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Also the owner's namespace directory under the blob root.
    #[sea_orm(unique)]
    pub username: String,
    pub full_name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password: String,

    pub is_staff: bool,
    /// Cleared instead of deleting the row.
    pub is_active: bool,

    #[sea_orm(has_one)]
    pub storage: HasOne<super::storage::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
