//! File manager for clouddrive.
//!
//! `FileManager` drives every operation that touches both stores:
//! - Upload: blob first, then metadata, deleting the blob again if the
//!   metadata insert fails
//! - Delete: blob first, then metadata
//! - Listing, statistics and downloads read through the metadata store
//! - Recovery replays journaled intents left behind by a crash or a failed
//!   compensation

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::journal::{Intent, IntentJournal, IntentToken};
use super::metadata::MetadataStore;
use super::model::{resolve_mime_type, FileRecord, NewFileRecord, StorageStats};
use super::naming::{is_upload_path, NamingPolicy};
use super::storage::BlobStore;
use super::MAX_FILE_SIZE_BYTES;
use crate::clock::{Clock, MonotonicClock};
use crate::config::FilesConfig;
use crate::error::{DeleteError, DownloadError, ListError, UploadError};
use crate::{DriveError, Result};

/// Settings supplied to the manager at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Largest accepted upload in bytes.
    pub max_file_size_bytes: u64,
    /// How storage keys are derived.
    pub naming: NamingPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            naming: NamingPolicy::default(),
        }
    }
}

impl From<&FilesConfig> for ManagerConfig {
    fn from(config: &FilesConfig) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes(),
            naming: config.naming,
        }
    }
}

/// Outcome of [`FileManager::recover`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Upload intents whose blob is referenced by a record.
    pub uploads_confirmed: usize,
    /// Upload intents whose unreferenced blob was removed.
    pub orphan_blobs_removed: usize,
    /// Delete intents finished on both stores.
    pub deletes_completed: usize,
    /// Intents that could not be resolved and remain journaled.
    pub failed: usize,
}

impl RecoveryReport {
    /// Number of intents examined.
    pub fn total(&self) -> usize {
        self.uploads_confirmed + self.orphan_blobs_removed + self.deletes_completed + self.failed
    }
}

/// Coordinates the blob store and the metadata store.
///
/// The manager holds no per-file state; it can be shared freely behind an
/// `Arc` and every operation runs to completion before returning.
pub struct FileManager {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    config: ManagerConfig,
    clock: Arc<dyn Clock>,
    journal: Option<IntentJournal>,
}

impl FileManager {
    /// Create a new FileManager.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            blobs,
            metadata,
            config,
            clock: Arc::new(MonotonicClock::default()),
            journal: None,
        }
    }

    /// Replace the clock used for naming and `uploaded_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record intents in `journal` before touching the stores.
    pub fn with_journal(mut self, journal: IntentJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Upload a file.
    ///
    /// # Validation
    /// - `original_name` must not be empty
    /// - `content` must not exceed the configured maximum size; oversized
    ///   content is rejected before either store is contacted
    ///
    /// # Returns
    /// The stored record, including its metadata id.
    pub async fn upload(
        &self,
        content: &[u8],
        original_name: &str,
        declared_mime_type: &str,
    ) -> std::result::Result<FileRecord, UploadError> {
        if original_name.is_empty() {
            return Err(UploadError::InvalidName);
        }

        let size = content.len() as u64;
        if size > self.config.max_file_size_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: self.config.max_file_size_bytes,
            });
        }

        let now = self.clock.now();
        let names = self.config.naming.derive(original_name, now);
        let mime_type = resolve_mime_type(declared_mime_type, original_name);

        let token = self
            .begin(
                Intent::Upload {
                    storage_path: names.storage_path.clone(),
                },
                now,
            )
            .await
            .map_err(UploadError::Journal)?;

        if let Err(e) = self
            .blobs
            .put(&names.storage_path, content, &mime_type)
            .await
        {
            warn!(storage_path = %names.storage_path, error = %e, "Blob write failed");
            // A rejected key wrote nothing. Any other failure may have left
            // part of the blob, so the intent stays for recovery.
            if is_rejected_key(&e) {
                self.finish(token.as_ref()).await;
            }
            return Err(UploadError::BlobWriteFailed(e));
        }

        let download_url = match self.blobs.public_url(&names.storage_path).await {
            Ok(url) => url,
            Err(e) => {
                warn!(storage_path = %names.storage_path, error = %e, "Public URL lookup failed");
                if self.compensate(&names.storage_path).await {
                    self.finish(token.as_ref()).await;
                }
                return Err(UploadError::BlobWriteFailed(e));
            }
        };

        let new_record = NewFileRecord {
            original_name: original_name.to_string(),
            stored_name: names.stored_name,
            size_bytes: size,
            mime_type,
            storage_path: names.storage_path,
            download_url,
            uploaded_at: now,
        };

        match self.metadata.insert(&new_record).await {
            Ok(record) => {
                self.finish(token.as_ref()).await;
                info!(
                    id = %record.id,
                    storage_path = %record.storage_path,
                    size_bytes = record.size_bytes,
                    "Uploaded file"
                );
                Ok(record)
            }
            Err(source) => {
                warn!(
                    storage_path = %new_record.storage_path,
                    error = %source,
                    "Metadata insert failed, removing blob"
                );
                let compensated = self.compensate(&new_record.storage_path).await;
                if compensated {
                    self.finish(token.as_ref()).await;
                }
                Err(UploadError::MetadataWriteFailed {
                    source,
                    compensated,
                })
            }
        }
    }

    /// All records, most recent first.
    pub async fn list_all(&self) -> std::result::Result<Vec<FileRecord>, ListError> {
        self.metadata.list_all().await.map_err(ListError)
    }

    /// Aggregate counts over a fresh listing.
    pub async fn stats(&self) -> std::result::Result<StorageStats, ListError> {
        let records = self.list_all().await?;
        Ok(StorageStats::from_records(&records))
    }

    /// Get a record by id.
    pub async fn get(&self, id: &str) -> Result<Option<FileRecord>> {
        self.metadata.get_by_id(id).await
    }

    /// Read a record and its blob content.
    pub async fn download(
        &self,
        id: &str,
    ) -> std::result::Result<(FileRecord, Vec<u8>), DownloadError> {
        let record = self
            .metadata
            .get_by_id(id)
            .await
            .map_err(DownloadError::MetadataReadFailed)?
            .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;

        let content = self
            .blobs
            .get(&record.storage_path)
            .await
            .map_err(DownloadError::BlobReadFailed)?;

        debug!(id, size = content.len(), "Downloaded file");
        Ok((record, content))
    }

    /// Delete a file: the blob first, then its record.
    ///
    /// A blob or record that is already gone counts as deleted, so repeating
    /// a delete succeeds.
    pub async fn delete(&self, id: &str, storage_path: &str) -> std::result::Result<(), DeleteError> {
        if !is_upload_path(storage_path) {
            return Err(DeleteError::InvalidStoragePath(storage_path.to_string()));
        }

        let token = self
            .begin(
                Intent::Delete {
                    id: id.to_string(),
                    storage_path: storage_path.to_string(),
                },
                self.clock.now(),
            )
            .await
            .map_err(DeleteError::Journal)?;

        if let Err(e) = ignore_not_found(self.blobs.delete(storage_path).await) {
            warn!(id, storage_path, error = %e, "Blob delete failed");
            self.finish(token.as_ref()).await;
            return Err(DeleteError::BlobDeleteFailed(e));
        }

        if let Err(e) = ignore_not_found(self.metadata.delete_by_id(id).await) {
            warn!(
                id,
                storage_path,
                error = %e,
                "Metadata delete failed after blob removal"
            );
            return Err(DeleteError::MetadataDeleteFailed(e));
        }

        self.finish(token.as_ref()).await;
        info!(id, storage_path, "Deleted file");
        Ok(())
    }

    /// Replay intents left in the journal.
    ///
    /// An upload intent keeps its blob when a record references it and
    /// deletes it otherwise. A delete intent is carried out again on both
    /// stores. Resolved intents are removed; the rest stay for the next run.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let Some(journal) = &self.journal else {
            return Ok(report);
        };

        for entry in journal.pending().await? {
            let outcome = match &entry.intent {
                Intent::Upload { storage_path } => self.recover_upload(storage_path).await,
                Intent::Delete { id, storage_path } => {
                    self.recover_delete(id, storage_path).await
                }
            };

            match outcome {
                Ok(resolved) => {
                    match resolved {
                        Resolved::Confirmed => report.uploads_confirmed += 1,
                        Resolved::OrphanRemoved => report.orphan_blobs_removed += 1,
                        Resolved::DeleteCompleted => report.deletes_completed += 1,
                    }
                    if let Err(e) = journal.complete(&entry.token).await {
                        warn!(token = %entry.token, error = %e, "Failed to clear recovered intent");
                    }
                }
                Err(e) => {
                    warn!(
                        token = %entry.token,
                        intent = ?entry.intent,
                        error = %e,
                        "Failed to recover intent"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.total() > 0 {
            info!(
                uploads_confirmed = report.uploads_confirmed,
                orphan_blobs_removed = report.orphan_blobs_removed,
                deletes_completed = report.deletes_completed,
                failed = report.failed,
                "Recovery finished"
            );
        }
        Ok(report)
    }

    async fn recover_upload(&self, storage_path: &str) -> Result<Resolved> {
        if self
            .metadata
            .find_by_storage_path(storage_path)
            .await?
            .is_some()
        {
            return Ok(Resolved::Confirmed);
        }

        match ignore_not_found(self.blobs.delete(storage_path).await) {
            Ok(()) => {}
            Err(e) if is_rejected_key(&e) => {
                debug!(storage_path, error = %e, "Blob key rejected, nothing was stored");
            }
            Err(e) => return Err(e),
        }
        info!(storage_path, "Removed orphaned blob");
        Ok(Resolved::OrphanRemoved)
    }

    async fn recover_delete(&self, id: &str, storage_path: &str) -> Result<Resolved> {
        ignore_not_found(self.blobs.delete(storage_path).await)?;
        ignore_not_found(self.metadata.delete_by_id(id).await)?;
        info!(id, storage_path, "Completed interrupted delete");
        Ok(Resolved::DeleteCompleted)
    }

    /// Best-effort removal of a blob written by a failed upload.
    async fn compensate(&self, storage_path: &str) -> bool {
        match ignore_not_found(self.blobs.delete(storage_path).await) {
            Ok(()) => {
                debug!(storage_path, "Compensating blob delete succeeded");
                true
            }
            Err(e) => {
                warn!(
                    storage_path,
                    error = %e,
                    "Compensating blob delete failed, blob is orphaned"
                );
                false
            }
        }
    }

    async fn begin(
        &self,
        intent: Intent,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<IntentToken>> {
        match &self.journal {
            Some(journal) => Ok(Some(journal.begin(intent, now).await?)),
            None => Ok(None),
        }
    }

    async fn finish(&self, token: Option<&IntentToken>) {
        if let (Some(journal), Some(token)) = (&self.journal, token) {
            if let Err(e) = journal.complete(token).await {
                warn!(%token, error = %e, "Failed to clear intent");
            }
        }
    }
}

enum Resolved {
    Confirmed,
    OrphanRemoved,
    DeleteCompleted,
}

/// The store refused the key itself, so nothing can exist under it.
fn is_rejected_key(e: &DriveError) -> bool {
    matches!(e, DriveError::Validation(_))
}

fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("blobs", &self.blobs.backend_name())
            .field("config", &self.config)
            .field("journal", &self.journal)
            .finish()
    }
}
