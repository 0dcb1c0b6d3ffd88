use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{storage, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::auth::account_conflict;
use crate::models::shared::{ListQuery, Pagination};
use crate::models::user::{
    UpdateUserRequest, UserListResponse, UserResponse, validate_update_request,
};
use crate::state::AppState;
use crate::utils::hash;

#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List users",
    description = "Staff only.",
    params(ListQuery),
    responses(
        (status = 200, description = "Users", body = UserListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    auth_user.require_staff()?;
    let (page, per_page) = query.bounds();

    let paginator = user::Entity::find()
        .find_also_related(storage::Entity)
        .order_by_asc(user::Column::Id)
        .paginate(&state.db, per_page);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page - 1).await?;

    let data = rows
        .into_iter()
        .map(|(user, storage)| profile(user, storage))
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Json(UserListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user",
    description = "Visible to the user themself and to staff.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = id))]
pub async fn get_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, AppError> {
    auth_user.require_owner_or_staff(id)?;
    let profile = find_profile(&state.db, id).await?;
    Ok(Json(profile))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Users",
    operation_id = "updateUser",
    summary = "Update a user",
    description = "Changes `full_name`, `email` or the password. A password change \
                   needs the caller's `current_password` and a matching `repeat_password`.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Email taken (EMAIL_TAKEN)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = id))]
pub async fn update_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth_user.require_owner_or_staff(id)?;
    validate_update_request(&payload)?;

    let (target, storage) = user::Entity::find_by_id(id)
        .find_also_related(storage::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let mut active: user::ActiveModel = target.clone().into();
    if let Some(full_name) = &payload.full_name {
        active.full_name = Set(full_name.trim().to_string());
    }
    if let Some(email) = &payload.email {
        active.email = Set(email.trim().to_lowercase());
    }
    if let Some(password) = &payload.password {
        // Checked against the caller, so staff confirm with their own password.
        let caller = find_user(&state.db, auth_user.user_id).await?;
        let current = payload.current_password.as_deref().unwrap_or_default();
        let is_valid = hash::verify_password(current, &caller.password)
            .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;
        if !is_valid {
            return Err(AppError::WrongPassword);
        }
        let hash = hash::hash_password(password)
            .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;
        active.password = Set(hash);
    }

    let user = if active.is_changed() {
        let user = active.update(&state.db).await.map_err(account_conflict)?;
        info!(
            user_id = id,
            by = auth_user.user_id,
            password_changed = payload.password.is_some(),
            "User updated"
        );
        user
    } else {
        target
    };

    Ok(Json(profile(user, storage)?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Users",
    operation_id = "deactivateUser",
    summary = "Deactivate a user",
    description = "Marks the account inactive. Its storage and files are kept.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deactivated"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = id))]
pub async fn deactivate_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_owner_or_staff(id)?;

    let result = user::Entity::update_many()
        .col_expr(user::Column::IsActive, Expr::value(false))
        .filter(user::Column::Id.eq(id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }

    info!(user_id = id, by = auth_user.user_id, "User deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// Load a user together with the id of their storage.
pub(crate) async fn find_profile<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<UserResponse, AppError> {
    let (user, storage) = user::Entity::find_by_id(id)
        .find_also_related(storage::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    profile(user, storage)
}

fn profile(user: user::Model, storage: Option<storage::Model>) -> Result<UserResponse, AppError> {
    let storage =
        storage.ok_or_else(|| AppError::Internal(format!("user {} has no storage", user.id)))?;
    Ok(UserResponse::new(user, storage.id))
}

async fn find_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}
