use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use stash_common::storage::StorageError;

use crate::accounting::FileError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `DUPLICATE_FILE`,
    /// `QUOTA_EXCEEDED`, `TOKEN_MISSING`, `TOKEN_INVALID`, `INVALID_CREDENTIALS`,
    /// `PERMISSION_DENIED`, `NOT_FOUND`, `CONFLICT`, `USERNAME_TAKEN`,
    /// `EMAIL_TAKEN`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Path must be empty or end with '/'")]
    pub message: String,
    /// Request field the error refers to, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "path")]
    pub field: Option<&'static str>,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// Validation failure tied to one request field.
    InvalidField {
        field: &'static str,
        message: String,
    },
    DuplicateFile(String),
    QuotaExceeded(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    /// `current_password` did not match on a password change.
    WrongPassword,
    PermissionDenied,
    NotFound(String),
    Conflict(String),
    UsernameTaken,
    EmailTaken,
    Internal(String),
}

impl AppError {
    fn body(code: &'static str, message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            code,
            message: message.into(),
            field: None,
        }
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Self::body("VALIDATION_ERROR", msg),
            ),
            AppError::InvalidField { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message,
                    field: Some(field),
                },
            ),
            AppError::DuplicateFile(msg) => {
                (StatusCode::BAD_REQUEST, Self::body("DUPLICATE_FILE", msg))
            }
            AppError::QuotaExceeded(msg) => {
                (StatusCode::BAD_REQUEST, Self::body("QUOTA_EXCEEDED", msg))
            }
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                Self::body("TOKEN_MISSING", "Authentication required"),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                Self::body("TOKEN_INVALID", "Invalid or expired token"),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Self::body("INVALID_CREDENTIALS", "Invalid username or password"),
            ),
            AppError::WrongPassword => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Current password is incorrect".into(),
                    field: Some("current_password"),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                Self::body("PERMISSION_DENIED", "Insufficient permissions"),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Self::body("NOT_FOUND", msg)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, Self::body("CONFLICT", msg)),
            AppError::UsernameTaken => (
                StatusCode::CONFLICT,
                Self::body("USERNAME_TAKEN", "Username is already taken"),
            ),
            AppError::EmailTaken => (
                StatusCode::CONFLICT,
                Self::body("EMAIL_TAKEN", "Email is already registered"),
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Self::body("INTERNAL_ERROR", "An unexpected error occurred"),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => AppError::NotFound("File not found".into()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::InvalidPath(message) => AppError::InvalidField {
                field: "path",
                message: message.into(),
            },
            FileError::InvalidName(message) => AppError::InvalidField {
                field: "name",
                message: message.into(),
            },
            FileError::TooLarge { .. } => AppError::InvalidField {
                field: "file",
                message: err.to_string(),
            },
            FileError::DuplicateFile { .. } => AppError::DuplicateFile(err.to_string()),
            FileError::QuotaExceeded { .. } => AppError::QuotaExceeded(err.to_string()),
            FileError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            FileError::LocationOccupied(_) => {
                AppError::Conflict("Storage location is occupied, try another name".into())
            }
            FileError::Aborted(detail) => AppError::Internal(detail),
            FileError::Storage(e) => AppError::from(e),
            FileError::Db(e) => AppError::from(e),
        }
    }
}
