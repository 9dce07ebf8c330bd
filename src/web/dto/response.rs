//! Response DTOs for the HTTP API.

use serde::Serialize;

use crate::file::{FileRecord, StorageStats};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// File record as returned by the API.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub original_name: String,
    pub stored_name: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    /// Human-readable size, e.g. `1.50 MB`.
    pub size_display: String,
    pub mime_type: String,
    pub storage_path: String,
    pub download_url: String,
    /// RFC 3339 timestamp.
    pub uploaded_at: String,
    pub file_extension: String,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            size_display: format_file_size(record.size_bytes),
            uploaded_at: record.uploaded_at.to_rfc3339(),
            id: record.id,
            original_name: record.original_name,
            stored_name: record.stored_name,
            size_bytes: record.size_bytes,
            size_mb: record.size_mb,
            mime_type: record.mime_type,
            storage_path: record.storage_path,
            download_url: record.download_url,
            file_extension: record.file_extension,
        }
    }
}

/// Storage statistics response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_files: u64,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    /// Human-readable total size.
    pub total_size_display: String,
}

impl From<StorageStats> for StatsResponse {
    fn from(stats: StorageStats) -> Self {
        Self {
            total_files: stats.total_files,
            total_size_bytes: stats.total_size_bytes,
            total_size_mb: stats.total_size_mb,
            total_size_display: format_file_size(stats.total_size_bytes),
        }
    }
}

/// Format a byte count as `B`, `KB` or `MB` with two decimals.
pub fn format_file_size(size_bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if size_bytes < KB {
        format!("{size_bytes} B")
    } else if size_bytes < MB {
        format!("{:.2} KB", size_bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", size_bytes as f64 / MB as f64)
    }
}
