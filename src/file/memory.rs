//! In-process store implementations.
//!
//! Used by tests and for running without any external services.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::metadata::MetadataStore;
use super::model::{FileRecord, NewFileRecord};
use super::storage::BlobStore;
use crate::{DriveError, Result};

#[derive(Debug, Clone)]
struct StoredBlob {
    content: Vec<u8>,
    content_type: String,
}

/// Blob store that keeps everything in a map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a blob is stored at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    /// Content type recorded for the blob at `path`.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.lock().get(path).map(|b| b.content_type.clone())
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredBlob>> {
        // A poisoned map is still structurally valid.
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, path: &str, content: &[u8], content_type: &str) -> Result<String> {
        if path.is_empty() {
            return Err(DriveError::Validation("empty blob key".to_string()));
        }
        self.lock().insert(
            path.to_string(),
            StoredBlob {
                content: content.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("memory://{path}"))
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        Ok(format!("memory://{path}"))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.lock()
            .get(path)
            .map(|b| b.content.clone())
            .ok_or_else(|| DriveError::NotFound(format!("blob {path}")))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| DriveError::NotFound(format!("blob {path}")))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.contains(path))
    }
}

/// Metadata store that keeps records in insertion order.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Mutex<Vec<FileRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FileRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: &NewFileRecord) -> Result<FileRecord> {
        let record = record.clone().into_record(Uuid::new_v4().to_string());
        self.lock().push(record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<FileRecord>> {
        // Newest insertion first, then a stable sort keeps that order for ties.
        let mut records: Vec<_> = self.lock().iter().rev().cloned().collect();
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(records)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>> {
        Ok(self.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Option<FileRecord>> {
        Ok(self
            .lock()
            .iter()
            .rev()
            .find(|r| r.storage_path == storage_path)
            .cloned())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let mut records = self.lock();
        match records.iter().position(|r| r.id == id) {
            Some(idx) => {
                records.remove(idx);
                Ok(())
            }
            None => Err(DriveError::NotFound(format!("file record {id}"))),
        }
    }
}
