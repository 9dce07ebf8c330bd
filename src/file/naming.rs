//! Storage key derivation.
//!
//! Every blob lives under [`UPLOAD_PREFIX`]. The default policy prefixes the
//! original filename with the upload second, so two uploads of the same name
//! within one second map to the same key and the later write wins. The
//! `Unique` policy uses a random token instead and cannot collide.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Namespace prefix of every blob key.
pub const UPLOAD_PREFIX: &str = "uploads/";

/// Format of the timestamp prefix.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Derived names for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName {
    /// Name within the upload namespace.
    pub stored_name: String,
    /// Full blob store key, `uploads/<stored_name>`.
    pub storage_path: String,
}

impl StoredName {
    fn from_stored_name(stored_name: String) -> Self {
        let storage_path = format!("{UPLOAD_PREFIX}{stored_name}");
        Self {
            stored_name,
            storage_path,
        }
    }
}

/// How stored names are derived from original filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingPolicy {
    /// `YYYYMMDD_HHMMSS_<original name>`.
    #[default]
    Timestamp,
    /// `<128-bit random token>_<sanitized original name>`.
    Unique,
}

impl NamingPolicy {
    /// Derive the stored name and storage path for an upload at `now`.
    pub fn derive(&self, original_name: &str, now: DateTime<Utc>) -> StoredName {
        match self {
            NamingPolicy::Timestamp => derive(original_name, now),
            NamingPolicy::Unique => {
                let token = Uuid::new_v4().simple();
                StoredName::from_stored_name(format!("{token}_{}", sanitize(original_name)))
            }
        }
    }
}

/// Timestamp naming: `format(now, "YYYYMMDD_HHMMSS") + "_" + original_name`.
pub fn derive(original_name: &str, now: DateTime<Utc>) -> StoredName {
    StoredName::from_stored_name(format!(
        "{}_{original_name}",
        now.format(TIMESTAMP_FORMAT)
    ))
}

/// Whether `path` is a key inside the upload namespace.
pub fn is_upload_path(path: &str) -> bool {
    path.len() > UPLOAD_PREFIX.len() && path.starts_with(UPLOAD_PREFIX)
}

/// Replace path separators and control characters so the name stays a
/// single key segment.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "file".to_string(),
        _ => cleaned,
    }
}
