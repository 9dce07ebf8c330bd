//! File record types and derived-field helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BYTES_PER_MB;

/// Content type used when neither the caller nor the filename tells us better.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Metadata describing one stored blob.
///
/// Records are immutable once written; they are only inserted and deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Identifier assigned by the metadata store.
    pub id: String,
    /// Filename as supplied by the uploader.
    pub original_name: String,
    /// Name of the blob inside the `uploads/` namespace.
    pub stored_name: String,
    /// Content length in bytes.
    pub size_bytes: u64,
    /// `size_bytes` in MiB, rounded to two decimals.
    pub size_mb: f64,
    /// Best-effort content type.
    pub mime_type: String,
    /// Blob store key, always `uploads/<stored_name>`.
    pub storage_path: String,
    /// Public link to the blob.
    pub download_url: String,
    /// When the record was created.
    pub uploaded_at: DateTime<Utc>,
    /// Lower-cased extension of `original_name` including the dot, or empty.
    pub file_extension: String,
}

/// A record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    /// Filename as supplied by the uploader.
    pub original_name: String,
    /// Name of the blob inside the `uploads/` namespace.
    pub stored_name: String,
    /// Content length in bytes.
    pub size_bytes: u64,
    /// Best-effort content type.
    pub mime_type: String,
    /// Blob store key.
    pub storage_path: String,
    /// Public link to the blob.
    pub download_url: String,
    /// When the record was created.
    pub uploaded_at: DateTime<Utc>,
}

impl NewFileRecord {
    /// Attach the store-assigned id, filling in the derived fields.
    pub fn into_record(self, id: impl Into<String>) -> FileRecord {
        let file_extension = file_extension(&self.original_name);
        FileRecord {
            id: id.into(),
            size_mb: size_mb(self.size_bytes),
            original_name: self.original_name,
            stored_name: self.stored_name,
            size_bytes: self.size_bytes,
            mime_type: self.mime_type,
            storage_path: self.storage_path,
            download_url: self.download_url,
            uploaded_at: self.uploaded_at,
            file_extension,
        }
    }
}

/// Aggregate numbers over a metadata snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StorageStats {
    /// Number of records.
    pub total_files: u64,
    /// Sum of `size_bytes`.
    pub total_size_bytes: u64,
    /// `total_size_bytes` in MiB, rounded to two decimals.
    pub total_size_mb: f64,
}

impl StorageStats {
    /// Aggregate a listing.
    pub fn from_records(records: &[FileRecord]) -> Self {
        let total_size_bytes = records.iter().map(|r| r.size_bytes).sum();
        Self {
            total_files: records.len() as u64,
            total_size_bytes,
            total_size_mb: size_mb(total_size_bytes),
        }
    }
}

/// Convert bytes to MiB rounded to two decimal places.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB as f64 * 100.0).round() / 100.0
}

/// Lower-cased extension of a filename, including the leading dot.
///
/// Leading dots of the final path segment do not start an extension, so
/// `.bashrc` has none.
pub fn file_extension(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = base.trim_start_matches('.');
    match stem.rfind('.') {
        Some(idx) => stem[idx..].to_lowercase(),
        None => String::new(),
    }
}

/// Pick the content type for an upload.
///
/// The declared type wins when present; otherwise it is guessed from the
/// filename, falling back to [`DEFAULT_MIME_TYPE`].
pub fn resolve_mime_type(declared: &str, original_name: &str) -> String {
    let declared = declared.trim();
    if !declared.is_empty() {
        return declared.to_string();
    }

    mime_guess::from_path(original_name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}
