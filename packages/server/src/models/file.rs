use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::file;
use crate::error::AppError;

/// Longest accepted note, in characters.
pub const MAX_NOTE_LEN: usize = 1000;

/// Stored file metadata.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = 3)]
    pub storage_id: i32,
    /// Directory path, `""` for the root.
    #[schema(example = "home/docs/")]
    pub path: String,
    #[schema(example = "report.pdf")]
    pub name: String,
    /// Filename the client uploaded.
    #[schema(example = "Report (final).pdf")]
    pub origin_name: String,
    pub public_id: Uuid,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    /// Size in bytes.
    #[schema(example = 48213)]
    pub size: i64,
    #[schema(example = "")]
    pub note: String,
    /// Public download path.
    #[schema(example = "/api/v1/files/0b6f1c2e-5d1a-4f5e-9a59-0c4b1a6f7d21")]
    pub url_path: String,
    pub last_download: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<file::Model> for FileResponse {
    fn from(file: file::Model) -> Self {
        Self {
            id: file.id,
            storage_id: file.storage_id,
            url_path: download_path(file.public_id),
            path: file.path,
            name: file.name,
            origin_name: file.origin_name,
            public_id: file.public_id,
            content_type: file.content_type,
            size: file.size,
            note: file.note,
            last_download: file.last_download,
            created_at: file.created_at,
        }
    }
}

pub fn download_path(public_id: Uuid) -> String {
    format!("/api/v1/files/{public_id}")
}

/// Request body for updating a file. Absent fields are left unchanged.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateFileRequest {
    /// New display name; the stored bytes are renamed with it.
    #[schema(example = "report-v2.pdf")]
    pub name: Option<String>,
    #[schema(example = "Signed copy")]
    pub note: Option<String>,
}

pub fn validate_note(note: &str) -> Result<(), AppError> {
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(AppError::InvalidField {
            field: "note",
            message: "Note must be at most 1000 characters".into(),
        });
    }
    Ok(())
}
