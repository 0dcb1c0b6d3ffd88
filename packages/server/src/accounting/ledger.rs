//! Quota ledger: the per-owner `files_count` / `files_size` counters.
//!
//! Every mutation is a single conditional `UPDATE`, and callers hold the
//! storage row lock for the surrounding transaction, so check-then-increment
//! cannot interleave between requests of the same owner.

use sea_orm::sea_query::{Expr, ExprTrait, LockType};
use sea_orm::*;
use tracing::warn;

use super::FileError;
use crate::entity::{file, storage};

fn used_bytes(storage: &storage::Model) -> u64 {
    u64::try_from(storage.files_size).unwrap_or(0)
}

/// Bytes still available before `max_bytes` is reached.
pub fn headroom(storage: &storage::Model, max_bytes: u64) -> u64 {
    max_bytes.saturating_sub(used_bytes(storage))
}

/// Fails with `QuotaExceeded` when `incoming` more bytes would not fit.
pub fn check_headroom(
    storage: &storage::Model,
    incoming: u64,
    max_bytes: u64,
) -> Result<(), FileError> {
    let used = used_bytes(storage);
    match used.checked_add(incoming) {
        Some(total) if total <= max_bytes => Ok(()),
        _ => Err(FileError::QuotaExceeded {
            used,
            incoming,
            max: max_bytes,
        }),
    }
}

/// Create the empty ledger of a new owner.
pub async fn open<C: ConnectionTrait>(conn: &C, owner_id: i32) -> Result<storage::Model, DbErr> {
    storage::ActiveModel {
        owner_id: Set(owner_id),
        files_count: Set(0),
        files_size: Set(0),
        ..Default::default()
    }
    .insert(conn)
    .await
}

pub async fn find_by_owner<C: ConnectionTrait>(
    conn: &C,
    owner_id: i32,
) -> Result<storage::Model, FileError> {
    storage::Entity::find()
        .filter(storage::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or(FileError::NotFound("Storage"))
}

/// Load the owner's storage row with `FOR UPDATE`.
pub async fn lock_by_owner<C: ConnectionTrait>(
    conn: &C,
    owner_id: i32,
) -> Result<storage::Model, FileError> {
    storage::Entity::find()
        .filter(storage::Column::OwnerId.eq(owner_id))
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(FileError::NotFound("Storage"))
}

/// Load a storage row by id with `FOR UPDATE`.
pub async fn lock<C: ConnectionTrait>(
    conn: &C,
    storage_id: i32,
) -> Result<storage::Model, FileError> {
    storage::Entity::find_by_id(storage_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(FileError::NotFound("Storage"))
}

/// Account for a new file of `size` bytes.
///
/// The ceiling is re-checked inside the `UPDATE` itself.
pub async fn on_file_created<C: ConnectionTrait>(
    conn: &C,
    storage_id: i32,
    size: u64,
    max_bytes: u64,
) -> Result<(), FileError> {
    let too_big = || FileError::QuotaExceeded {
        used: 0,
        incoming: size,
        max: max_bytes,
    };
    let delta = i64::try_from(size).map_err(|_| too_big())?;
    let ceiling = i64::try_from(max_bytes).unwrap_or(i64::MAX);

    let result = storage::Entity::update_many()
        .col_expr(
            storage::Column::FilesCount,
            Expr::col(storage::Column::FilesCount).add(1),
        )
        .col_expr(
            storage::Column::FilesSize,
            Expr::col(storage::Column::FilesSize).add(delta),
        )
        .filter(storage::Column::Id.eq(storage_id))
        .filter(Expr::col(storage::Column::FilesSize).add(delta).lte(ceiling))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let current = storage::Entity::find_by_id(storage_id)
            .one(conn)
            .await?
            .ok_or(FileError::NotFound("Storage"))?;
        return Err(FileError::QuotaExceeded {
            used: used_bytes(&current),
            incoming: size,
            max: max_bytes,
        });
    }

    Ok(())
}

/// Release a deleted file of `size` bytes. Counters never go negative; if
/// they would, they are recomputed from the registry instead.
pub async fn on_file_deleted<C: ConnectionTrait>(
    conn: &C,
    storage_id: i32,
    size: i64,
) -> Result<(), FileError> {
    let result = storage::Entity::update_many()
        .col_expr(
            storage::Column::FilesCount,
            Expr::col(storage::Column::FilesCount).sub(1),
        )
        .col_expr(
            storage::Column::FilesSize,
            Expr::col(storage::Column::FilesSize).sub(size),
        )
        .filter(storage::Column::Id.eq(storage_id))
        .filter(storage::Column::FilesCount.gte(1))
        .filter(storage::Column::FilesSize.gte(size))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(storage_id, size, "Ledger lower than the released file, recounting");
        recount(conn, storage_id).await?;
    }

    Ok(())
}

/// True `(count, total size)` of the files registered in a storage.
pub async fn aggregate<C: ConnectionTrait>(conn: &C, storage_id: i32) -> Result<(i64, i64), DbErr> {
    let row: Option<(i64, i64)> = file::Entity::find()
        .select_only()
        .column_as(Expr::cust("COUNT(*)"), "files_count")
        .column_as(Expr::cust("COALESCE(SUM(\"size\"), 0)::BIGINT"), "files_size")
        .filter(file::Column::StorageId.eq(storage_id))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(row.unwrap_or((0, 0)))
}

/// Overwrite the counters with the registry's true aggregate.
pub async fn recount<C: ConnectionTrait>(conn: &C, storage_id: i32) -> Result<(i64, i64), DbErr> {
    let (count, size) = aggregate(conn, storage_id).await?;
    storage::Entity::update_many()
        .col_expr(storage::Column::FilesCount, Expr::value(count))
        .col_expr(storage::Column::FilesSize, Expr::value(size))
        .filter(storage::Column::Id.eq(storage_id))
        .exec(conn)
        .await?;
    Ok((count, size))
}
