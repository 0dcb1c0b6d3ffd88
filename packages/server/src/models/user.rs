use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::{invalid, is_valid_email};
use super::shared::Pagination;
use crate::entity::user;
use crate::error::AppError;

/// Public view of an account.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "alice_w")]
    pub username: String,
    #[schema(example = "Alice Wonder")]
    pub full_name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
    /// The user's storage, for `GET /storages/{id}`.
    #[schema(example = 3)]
    pub storage_id: i32,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(user: user::Model, storage_id: i32) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            is_staff: user.is_staff,
            is_active: user.is_active,
            storage_id,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<UserResponse>,
    pub pagination: Pagination,
}

/// Partial account update. Absent fields are left unchanged.
///
/// Changing the password requires `current_password`, checked against the
/// caller's own password, and a matching `repeat_password`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    #[schema(example = "Alice Liddell")]
    pub full_name: Option<String>,
    #[schema(example = "alice@wonderland.example")]
    pub email: Option<String>,
    pub password: Option<String>,
    pub repeat_password: Option<String>,
    pub current_password: Option<String>,
}

pub fn validate_update_request(payload: &UpdateUserRequest) -> Result<(), AppError> {
    if let Some(full_name) = &payload.full_name {
        let full_name = full_name.trim();
        if full_name.is_empty() || full_name.chars().count() > 50 {
            return Err(invalid("full_name", "Full name must be 1-50 characters"));
        }
    }
    if let Some(email) = &payload.email {
        if !is_valid_email(email.trim()) {
            return Err(invalid("email", "Enter a valid email address"));
        }
    }

    let Some(password) = &payload.password else {
        return Ok(());
    };
    if password.len() < 8 || password.len() > 128 {
        return Err(invalid("password", "Password must be 8-128 characters"));
    }
    if payload.repeat_password.as_deref() != Some(password.as_str()) {
        return Err(invalid("repeat_password", "Passwords do not match"));
    }
    match payload.current_password.as_deref() {
        None | Some("") => Err(invalid(
            "current_password",
            "Current password is required to set a new one",
        )),
        Some(current) if current == password => Err(invalid(
            "password",
            "New password must differ from the current one",
        )),
        Some(_) => Ok(()),
    }
}
