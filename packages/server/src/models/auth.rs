use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Request body for user registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// Unique username (4-20 chars, letters, digits and underscores). Also
    /// names the user's directory in the blob store.
    #[schema(example = "alice_w")]
    pub username: String,
    /// Display name (1-50 characters).
    #[schema(example = "Alice Wonder")]
    pub full_name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    /// Must equal `password`.
    #[schema(example = "s3cure_P@ss!")]
    pub repeat_password: String,
}

pub(crate) fn invalid(field: &'static str, message: &str) -> AppError {
    AppError::InvalidField {
        field,
        message: message.into(),
    }
}

pub fn validate_register_request(payload: &RegisterRequest) -> Result<(), AppError> {
    let username = payload.username.trim();
    let len = username.chars().count();
    if !(4..=20).contains(&len) {
        return Err(invalid("username", "Username must be 4-20 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid(
            "username",
            "Username must contain only letters, digits, and underscores",
        ));
    }
    let full_name = payload.full_name.trim();
    if full_name.is_empty() || full_name.chars().count() > 50 {
        return Err(invalid("full_name", "Full name must be 1-50 characters"));
    }
    if !is_valid_email(payload.email.trim()) {
        return Err(invalid("email", "Enter a valid email address"));
    }
    if payload.password.len() < 8 || payload.password.len() > 128 {
        return Err(invalid("password", "Password must be 8-128 characters"));
    }
    if payload.password != payload.repeat_password {
        return Err(invalid("repeat_password", "Passwords do not match"));
    }
    Ok(())
}

/// Shape check only: `local@domain.tld`, no whitespace.
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Request body for user login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// Username of the account to log into.
    #[schema(example = "alice_w")]
    pub username: String,
    /// Account password.
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("Username must not be empty".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "alice_w")]
    pub username: String,
    pub is_staff: bool,
}
