//! Error types for clouddrive.

use thiserror::Error;

/// Common error type for store clients and infrastructure.
#[derive(Error, Debug)]
pub enum DriveError {
    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport or status error from a remote store.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DriveError {
    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        match self {
            DriveError::NotFound(_) => true,
            DriveError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for DriveError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => DriveError::NotFound("row".to_string()),
            other => DriveError::Database(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(e: reqwest::Error) -> Self {
        DriveError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for DriveError {
    fn from(e: serde_json::Error) -> Self {
        DriveError::Serialization(e.to_string())
    }
}

/// Result type alias for clouddrive operations.
pub type Result<T> = std::result::Result<T, DriveError>;

/// Failure of [`FileManager::upload`](crate::file::FileManager::upload).
#[derive(Error, Debug)]
pub enum UploadError {
    /// The original filename was empty.
    #[error("original filename must not be empty")]
    InvalidName,

    /// The content exceeds the configured limit. No store was contacted.
    #[error("file size {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Size of the rejected content.
        size: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// Writing the blob failed; no metadata was written.
    #[error("blob write failed: {0}")]
    BlobWriteFailed(#[source] DriveError),

    /// Inserting the metadata record failed after the blob was written.
    ///
    /// `compensated` reports whether the just-written blob was removed again.
    #[error("metadata write failed (blob removed: {compensated}): {source}")]
    MetadataWriteFailed {
        /// Underlying metadata store error.
        #[source]
        source: DriveError,
        /// Whether the compensating blob delete succeeded.
        compensated: bool,
    },

    /// The upload intent could not be recorded; no store was contacted.
    #[error("failed to record upload intent: {0}")]
    Journal(#[source] DriveError),
}

/// Failure of a metadata listing.
#[derive(Error, Debug)]
#[error("failed to list files: {0}")]
pub struct ListError(#[source] pub DriveError);

/// Failure of [`FileManager::delete`](crate::file::FileManager::delete).
#[derive(Error, Debug)]
pub enum DeleteError {
    /// The storage path is not a key under `uploads/`.
    #[error("invalid storage path: {0}")]
    InvalidStoragePath(String),

    /// Deleting the blob failed; the metadata record is untouched.
    #[error("blob delete failed: {0}")]
    BlobDeleteFailed(#[source] DriveError),

    /// The blob is gone but the metadata record could not be removed.
    #[error("metadata delete failed after blob removal: {0}")]
    MetadataDeleteFailed(#[source] DriveError),

    /// The delete intent could not be recorded; no store was contacted.
    #[error("failed to record delete intent: {0}")]
    Journal(#[source] DriveError),
}

/// Failure of [`FileManager::download`](crate::file::FileManager::download).
#[derive(Error, Debug)]
pub enum DownloadError {
    /// No record exists with the given id.
    #[error("file {0} not found")]
    NotFound(String),

    /// Reading the metadata record failed.
    #[error("metadata read failed: {0}")]
    MetadataReadFailed(#[source] DriveError),

    /// The record exists but its blob could not be read.
    #[error("blob read failed: {0}")]
    BlobReadFailed(#[source] DriveError),
}
