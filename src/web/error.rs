//! API error handling for the clouddrive HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{DeleteError, DownloadError, ListError, UploadError};
use crate::DriveError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Not found (404).
    NotFound,
    /// Payload too large (413).
    PayloadTooLarge,
    /// A backing store failed (502).
    StorageError,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::StorageError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create a payload too large error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<DriveError> for ApiError {
    fn from(err: DriveError) -> Self {
        match &err {
            DriveError::NotFound(msg) => ApiError::not_found(format!("{msg} not found")),
            DriveError::Validation(msg) => ApiError::bad_request(msg.clone()),
            _ => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match &err {
            UploadError::InvalidName => ApiError::bad_request("File name must not be empty"),
            UploadError::TooLarge { limit, .. } => ApiError::payload_too_large(format!(
                "File too large (max {}MB)",
                limit / crate::config::BYTES_PER_MB
            )),
            UploadError::BlobWriteFailed(_) => {
                tracing::error!("Upload failed: {}", err);
                ApiError::storage("Failed to store file")
            }
            UploadError::MetadataWriteFailed { .. } => {
                tracing::error!("Upload failed: {}", err);
                ApiError::storage("Failed to record file metadata")
            }
            UploadError::Journal(_) => {
                tracing::error!("Upload failed: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

impl From<ListError> for ApiError {
    fn from(err: ListError) -> Self {
        tracing::error!("{}", err);
        ApiError::storage("Failed to list files")
    }
}

impl From<DeleteError> for ApiError {
    fn from(err: DeleteError) -> Self {
        match &err {
            DeleteError::InvalidStoragePath(path) => {
                ApiError::bad_request(format!("Invalid storage path: {path}"))
            }
            DeleteError::BlobDeleteFailed(_) => {
                tracing::error!("Delete failed: {}", err);
                ApiError::storage("Failed to delete file")
            }
            DeleteError::MetadataDeleteFailed(_) => {
                tracing::error!("Delete failed: {}", err);
                ApiError::storage("File removed but its metadata could not be deleted")
            }
            DeleteError::Journal(_) => {
                tracing::error!("Delete failed: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        match &err {
            DownloadError::NotFound(_) => ApiError::not_found("File not found"),
            DownloadError::MetadataReadFailed(_) | DownloadError::BlobReadFailed(_) => {
                tracing::error!("Download failed: {}", err);
                ApiError::storage("Failed to load file")
            }
        }
    }
}
