//! File handlers for the HTTP API.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::web::dto::{ApiResponse, FileResponse, StatsResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are dropped, quotes and backslashes replaced, and
/// non-ASCII names additionally carried in an RFC 5987 `filename*`.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

fn multipart_error(e: MultipartError, max_upload_size: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large(format!(
            "File too large (max {}MB)",
            max_upload_size / crate::config::BYTES_PER_MB
        ));
    }
    tracing::error!("Failed to read multipart data: {}", e);
    ApiError::bad_request("Invalid multipart data")
}

/// GET /api/files - List all files, most recent first.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let records = state.manager.list_all().await?;
    let files = records.into_iter().map(FileResponse::from).collect();
    Ok(Json(ApiResponse::new(files)))
}

/// GET /api/files/stats - Aggregate storage statistics.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsResponse>>, ApiError> {
    let stats = state.manager.stats().await?;
    Ok(Json(ApiResponse::new(stats.into())))
}

/// POST /api/files - Upload a file.
///
/// Request body: multipart/form-data with a "file" field.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, state.max_upload_size))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, state.max_upload_size))?
            .to_vec();
        upload = Some((filename, content_type, content));
    }

    let (filename, content_type, content) =
        upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let record = state
        .manager
        .upload(&content, &filename, &content_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FileResponse::from(record))),
    ))
}

/// GET /api/files/:id - Get file metadata.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let record = state
        .manager
        .get(&file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    Ok(Json(ApiResponse::new(record.into())))
}

/// GET /api/files/:id/download - Download file content.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let (record, content) = state.manager.download(&file_id).await?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, &record.mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&record.original_name),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

/// DELETE /api/files/:id - Delete a file and its metadata.
///
/// An id without a record is already deleted and succeeds as well.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let Some(record) = state.manager.get(&file_id).await? else {
        tracing::debug!(id = %file_id, "Delete of unknown file id");
        return Ok(Json(ApiResponse::new(())));
    };

    state
        .manager
        .delete(&record.id, &record.storage_path)
        .await?;

    Ok(Json(ApiResponse::new(())))
}
