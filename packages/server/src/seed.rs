use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::file;

const FILE_STORAGE_SIZE_INDEX: &str = "idx_file_storage_size";

/// Create indexes that schema sync cannot declare on the entities.
///
/// A failure is logged and startup continues; the index only speeds up
/// ledger recounts.
pub async fn ensure_indexes(db: &DatabaseConnection) {
    // SELECT COUNT(*), SUM(size) FROM file WHERE storage_id = ?
    let stmt = Index::create()
        .if_not_exists()
        .name(FILE_STORAGE_SIZE_INDEX)
        .table(file::Entity)
        .col(file::Column::StorageId)
        .col(file::Column::Size)
        .to_string(PostgresQueryBuilder);

    match db.execute_unprepared(&stmt).await {
        Ok(_) => info!(index = FILE_STORAGE_SIZE_INDEX, "Index ready"),
        Err(e) => warn!(index = FILE_STORAGE_SIZE_INDEX, error = %e, "Failed to create index"),
    }
}
