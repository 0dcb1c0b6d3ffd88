use std::io;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use futures::TryStreamExt;
use stash_common::storage::StagedBlob;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::instrument;
use uuid::Uuid;

use crate::accounting::{FileError, FileUpdate, NewFile};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::file::{FileResponse, UpdateFileRequest, validate_note};
use crate::state::AppState;

/// Slack for multipart framing and the text fields around the file part.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let limit = max_upload_size.saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Files",
    operation_id = "uploadFile",
    summary = "Upload a file",
    description = "Multipart upload into the caller's storage. Fields: `file` (required), \
        `name` (display name, defaults to the uploaded filename), `path` (directory, `\"\"` or \
        `a/b/` form, default root), `note`. The upload counts against the caller's quota.",
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "File stored", body = FileResponse),
        (status = 400, description = "Invalid input, duplicate name or quota exceeded (VALIDATION_ERROR, DUPLICATE_FILE, QUOTA_EXCEEDED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Storage location occupied (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut staged: Option<Result<StagedBlob, FileError>> = None;
    let mut origin_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut name: Option<String> = None;
    let mut path: Option<String> = None;
    let mut note: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // A rejected file part is left unread, which can trip the body
            // limit; the rejection is the better answer.
            Err(e) => {
                return Err(match staged {
                    Some(Err(rejected)) => rejected.into(),
                    _ => AppError::Validation(format!("Multipart error: {e}")),
                });
            }
        };
        match field.name() {
            Some("file") if staged.is_none() => {
                origin_name = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                let mut reader = StreamReader::new(field.map_err(io::Error::other));
                // Input and duplicate errors take precedence over a rejected
                // stream, so keep the outcome for later.
                staged = Some(state.files.receive(auth_user.user_id, &mut reader).await);
            }
            Some("name") => name = Some(read_text(field, "name").await?),
            Some("path") => path = Some(read_text(field, "path").await?),
            Some("note") => note = Some(read_text(field, "note").await?),
            _ => {} // Ignore unknown fields.
        }
    }

    let origin_name = origin_name.filter(|n| !n.trim().is_empty());
    let name = name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| origin_name.clone())
        .ok_or_else(|| AppError::InvalidField {
            field: "name",
            message: "A name or a filename on the file part is required".into(),
        })?;
    let note = note.unwrap_or_default();
    validate_note(&note)?;

    let content_type = content_type
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .or_else(|| mime_guess::from_path(&name).first().map(|m| m.to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut new = NewFile {
        path: path.unwrap_or_default(),
        origin_name: origin_name.unwrap_or_else(|| name.clone()),
        name,
        note,
        content_type,
    };
    new.validate()?;
    state.files.check_free(auth_user.user_id, &new).await?;

    let staged = staged.ok_or_else(|| AppError::InvalidField {
        field: "file",
        message: "Missing 'file' field".into(),
    })??;

    let record = state.files.create(auth_user.user_id, new, staged).await?;

    Ok((StatusCode::CREATED, Json(FileResponse::from(record))))
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    name: &'static str,
) -> Result<String, AppError> {
    field.text().await.map_err(|e| AppError::InvalidField {
        field: name,
        message: format!("Failed to read {name}: {e}"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download a file",
    description = "Streams the file by its public id. No authentication: the id is the \
        capability. Supports ETag-based caching via If-None-Match.",
    params(("id" = Uuid, Path, description = "Public file ID")),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 404, description = "Unknown id or missing bytes (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let public_id =
        Uuid::parse_str(&id).map_err(|_| AppError::NotFound("File not found".into()))?;

    let (record, reader) = state.files.open(public_id).await?;

    let etag_value = format!("\"{}\"", record.content_hash);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let body = Body::from_stream(ReaderStream::new(reader));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &record.content_type)
        .header(header::CONTENT_LENGTH, record.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&record.name),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Files",
    operation_id = "updateFile",
    summary = "Rename or annotate a file",
    params(("id" = i32, Path, description = "File ID")),
    request_body = UpdateFileRequest,
    responses(
        (status = 200, description = "File updated", body = FileResponse),
        (status = 400, description = "Invalid input or duplicate name (VALIDATION_ERROR, DUPLICATE_FILE)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(file_id = id))]
pub async fn update_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateFileRequest>,
) -> Result<Json<FileResponse>, AppError> {
    let owner_id = state.files.owner_of(id).await?;
    auth_user.require_owner_or_staff(owner_id)?;

    if let Some(note) = &payload.note {
        validate_note(note)?;
    }

    let record = state
        .files
        .update(
            id,
            FileUpdate {
                name: payload.name,
                note: payload.note,
            },
        )
        .await?;

    Ok(Json(FileResponse::from(record)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Files",
    operation_id = "deleteFile",
    summary = "Delete a file",
    description = "Removes the file and its bytes and releases its quota.",
    params(("id" = i32, Path, description = "File ID")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(file_id = id))]
pub async fn delete_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = state.files.owner_of(id).await?;
    auth_user.require_owner_or_staff(owner_id)?;

    state.files.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("inline; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
