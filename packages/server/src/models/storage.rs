use serde::Serialize;

use super::file::FileResponse;
use super::shared::Pagination;
use crate::entity::{storage, user};

#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageOwner {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "alice_w")]
    pub username: String,
}

/// Quota usage of one user.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageSummary {
    #[schema(example = 3)]
    pub id: i32,
    #[schema(example = 12)]
    pub files_count: i64,
    /// Bytes in use.
    #[schema(example = 1048576)]
    pub files_size: i64,
    /// Byte ceiling.
    #[schema(example = 1073741824)]
    pub max_size: u64,
    pub owner: StorageOwner,
}

impl StorageSummary {
    pub fn new(storage: storage::Model, owner: user::Model, max_size: u64) -> Self {
        Self {
            id: storage.id,
            files_count: storage.files_count,
            files_size: storage.files_size,
            max_size,
            owner: StorageOwner {
                id: owner.id,
                username: owner.username,
            },
        }
    }
}

/// A storage with its files.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageDetail {
    #[serde(flatten)]
    pub summary: StorageSummary,
    pub files: Vec<FileResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageListResponse {
    pub data: Vec<StorageSummary>,
    pub pagination: Pagination,
}
