//! Blob store abstraction and the local filesystem backend.
//!
//! Keys are slash-delimited strings such as `uploads/20240101_120000_a.txt`.
//! The local backend maps a key onto the same relative path below its base
//! directory:
//! ```text
//! {base_path}/
//! └── uploads/
//!     ├── 20240101_120000_report.pdf
//!     └── 20240101_120005_photo.png
//! ```
//!
//! Segments that cannot be used as a file name as-is are escaped first.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{DriveError, Result};

/// Key-addressed blob storage.
///
/// Implementations must report a missing key as [`DriveError::NotFound`] from
/// `get` and `delete` so callers can treat repeated deletes as no-ops.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Write `content` at `path`, replacing any existing blob.
    ///
    /// Returns a backend-specific locator for the written blob.
    async fn put(&self, path: &str, content: &[u8], content_type: &str) -> Result<String>;

    /// Publicly resolvable link for `path`.
    async fn public_url(&self, path: &str) -> Result<String>;

    /// Read the blob at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete the blob at `path`.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Whether a blob exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Percent-encode each segment of a key, keeping the separators.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// On-disk file name for one key segment.
///
/// `%`, `\` and NUL are percent-encoded. The relative segments `.` and `..`
/// become `%2E` and `%2E%2E`, and an empty segment (from `//` or a trailing
/// `/`) becomes `%2F`. Every other character is kept, so ordinary keys map
/// onto identical paths.
fn disk_segment(segment: &str) -> String {
    match segment {
        "" => "%2F".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => {
            let mut escaped = String::with_capacity(segment.len());
            for c in segment.chars() {
                match c {
                    '%' => escaped.push_str("%25"),
                    '\\' => escaped.push_str("%5C"),
                    '\0' => escaped.push_str("%00"),
                    _ => escaped.push(c),
                }
            }
            escaped
        }
    }
}

/// Key with every segment replaced by its on-disk name.
fn disk_key(key: &str) -> String {
    key.split('/').map(disk_segment).collect::<Vec<_>>().join("/")
}

/// Blob store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Base directory for blobs.
    base_path: PathBuf,
    /// URL prefix under which `base_path` is served.
    public_base_url: String,
}

impl LocalBlobStore {
    /// Create a store rooted at `base_path`.
    ///
    /// The base directory will be created if it doesn't exist. Public URLs are
    /// `<public_base_url>/files/<key>`.
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        tracing::info!(path = %base_path.display(), "Opened local blob store");

        Ok(Self {
            base_path,
            public_base_url,
        })
    }

    /// Get the base path of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a key to a filesystem path below the base directory.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(DriveError::Validation("empty blob key".to_string()));
        }

        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            let name = disk_segment(segment);
            let mut components = Path::new(&name).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => path.push(part),
                _ => {
                    return Err(DriveError::Validation(format!(
                        "invalid blob key: {key:?}"
                    )))
                }
            }
        }

        Ok(path)
    }

    /// Remove directories left empty by a delete, stopping at the key's
    /// top-level directory.
    async fn prune_empty_dirs(&self, key: &str, file_path: &Path) {
        let Some(top) = key.split('/').next() else {
            return;
        };
        let stop = self.base_path.join(disk_segment(top));

        let mut dir = file_path.parent();
        while let Some(current) = dir {
            if current == stop || !current.starts_with(&stop) {
                break;
            }
            if tokio::fs::remove_dir(current).await.is_err() {
                break;
            }
            tracing::debug!(path = %current.display(), "Removed empty blob directory");
            dir = current.parent();
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[tracing::instrument(skip(self, content, content_type), fields(size = content.len()))]
    async fn put(&self, path: &str, content: &[u8], content_type: &str) -> Result<String> {
        let file_path = self.resolve(path)?;

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file, then rename into place.
        let mut temp_name = file_path.as_os_str().to_owned();
        temp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let temp_path = PathBuf::from(temp_name);

        if let Err(e) = tokio::fs::write(&temp_path, content).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &file_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(
            path = %file_path.display(),
            content_type,
            "Stored blob"
        );
        Ok(file_path.to_string_lossy().into_owned())
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        self.resolve(path)?;
        Ok(format!(
            "{}/files/{}",
            self.public_base_url,
            encode_key(&disk_key(path))
        ))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let file_path = self.resolve(path)?;

        match tokio::fs::read(&file_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DriveError::NotFound(format!("blob {path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        let file_path = self.resolve(path)?;

        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => {
                tracing::debug!(path = %file_path.display(), "Deleted blob");
                self.prune_empty_dirs(path, &file_path).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DriveError::NotFound(format!("blob {path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let file_path = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&file_path).await?)
    }
}
