use axum::{
    Json,
    extract::{Path, Query, State},
};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{file, storage, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::file::FileResponse;
use crate::models::shared::{ListQuery, Pagination};
use crate::models::storage::{StorageDetail, StorageListResponse, StorageSummary};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Storages",
    operation_id = "listStorages",
    summary = "List storages",
    description = "Quota usage of every user. Staff only.",
    params(ListQuery),
    responses(
        (status = 200, description = "Storages", body = StorageListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_storages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<StorageListResponse>, AppError> {
    auth_user.require_staff()?;
    let (page, per_page) = query.bounds();
    let max_size = state.files.max_bytes();

    let paginator = storage::Entity::find()
        .find_also_related(user::Entity)
        .order_by_asc(storage::Column::Id)
        .paginate(&state.db, per_page);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page - 1).await?;

    let data = rows
        .into_iter()
        .map(|(storage, owner)| {
            let owner =
                owner.ok_or_else(|| AppError::Internal(format!("storage {} has no owner", storage.id)))?;
            Ok(StorageSummary::new(storage, owner, max_size))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Json(StorageListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Storages",
    operation_id = "getStorage",
    summary = "Get a storage with its files",
    description = "Visible to the owner and to staff.",
    params(("id" = i32, Path, description = "Storage ID")),
    responses(
        (status = 200, description = "Storage", body = StorageDetail),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(storage_id = id))]
pub async fn get_storage(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<StorageDetail>, AppError> {
    let (storage, owner) = storage::Entity::find_by_id(id)
        .find_also_related(user::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Storage not found".into()))?;

    auth_user.require_owner_or_staff(storage.owner_id)?;

    let owner = owner.ok_or_else(|| AppError::Internal(format!("storage {id} has no owner")))?;

    let files = file::Entity::find()
        .filter(file::Column::StorageId.eq(storage.id))
        .order_by_asc(file::Column::Path)
        .order_by_asc(file::Column::Name)
        .all(&state.db)
        .await?;

    Ok(Json(StorageDetail {
        summary: StorageSummary::new(storage, owner, state.files.max_bytes()),
        files: files.into_iter().map(FileResponse::from).collect(),
    }))
}
