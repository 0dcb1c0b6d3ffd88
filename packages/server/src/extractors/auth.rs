use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::EntityTrait;

use crate::entity::user;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::{jwt, permission};

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication. The account is
/// re-read on every request, so deactivation takes effect immediately.
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub is_staff: bool,
}

impl AuthUser {
    /// Owner-or-staff check against the owner of a resource.
    pub fn require_owner_or_staff(&self, owner_id: i32) -> Result<(), AppError> {
        if permission::authorize(self.user_id, owner_id, self.is_staff) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::TokenInvalid)?;

        let account = user::Entity::find_by_id(claims.uid)
            .one(&state.db)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id: account.id,
            username: account.username,
            is_staff: account.is_staff,
        })
    }
}
