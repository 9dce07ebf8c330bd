//! Test helpers for integration tests.
//!
//! Provides store wrappers that count calls and fail on demand, plus a
//! fixture wiring them into a `FileManager`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use clouddrive::file::NewFileRecord;
use clouddrive::{
    BlobStore, DriveError, FileManager, FileRecord, IntentJournal, ManagerConfig, ManualClock, MemoryBlobStore,
    MemoryMetadataStore, MetadataStore, Result,
};

/// Switch plus call counter for one store operation.
#[derive(Debug, Default)]
pub struct Fault {
    fail: AtomicBool,
    reject: AtomicBool,
    calls: AtomicUsize,
}

impl Fault {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail with a validation error, as a store does for a key it refuses.
    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self, what: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            Err(DriveError::Validation(format!("{what} refused key")))
        } else if self.fail.load(Ordering::SeqCst) {
            Err(DriveError::Http(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

/// Blob store that can be told to fail.
#[derive(Debug, Default)]
pub struct FaultyBlobStore {
    pub inner: MemoryBlobStore,
    pub put: Fault,
    pub public_url: Fault,
    pub get: Fault,
    pub delete: Fault,
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    fn backend_name(&self) -> &'static str {
        "faulty"
    }

    async fn put(&self, path: &str, content: &[u8], content_type: &str) -> Result<String> {
        self.put.hit("put")?;
        self.inner.put(path, content, content_type).await
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        self.public_url.hit("public_url")?;
        self.inner.public_url(path).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.get.hit("get")?;
        self.inner.get(path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.delete.hit("delete")?;
        self.inner.delete(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path).await
    }
}

/// Metadata store that can be told to fail.
#[derive(Debug, Default)]
pub struct FaultyMetadataStore {
    pub inner: MemoryMetadataStore,
    pub insert: Fault,
    pub list: Fault,
    pub get: Fault,
    pub delete: Fault,
}

#[async_trait]
impl MetadataStore for FaultyMetadataStore {
    async fn insert(&self, record: &NewFileRecord) -> Result<FileRecord> {
        self.insert.hit("insert")?;
        self.inner.insert(record).await
    }

    async fn list_all(&self) -> Result<Vec<FileRecord>> {
        self.list.hit("list")?;
        self.inner.list_all().await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>> {
        self.get.hit("get")?;
        self.inner.get_by_id(id).await
    }

    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Option<FileRecord>> {
        self.inner.find_by_storage_path(storage_path).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.delete.hit("delete")?;
        self.inner.delete_by_id(id).await
    }
}

/// A manager over faulty in-memory stores and a manual clock.
pub struct Harness {
    pub blobs: Arc<FaultyBlobStore>,
    pub metadata: Arc<FaultyMetadataStore>,
    pub clock: Arc<ManualClock>,
    pub manager: FileManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        let blobs = Arc::new(FaultyBlobStore::default());
        let metadata = Arc::new(FaultyMetadataStore::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let manager = FileManager::new(blobs.clone(), metadata.clone(), config)
            .with_clock(clock.clone());

        Self {
            blobs,
            metadata,
            clock,
            manager,
        }
    }

    pub fn with_journal(mut self, journal: IntentJournal) -> Self {
        self.manager = self.manager.with_journal(journal);
        self
    }

    /// Total calls that could have mutated either store.
    pub fn mutating_calls(&self) -> usize {
        self.blobs.put.calls()
            + self.blobs.delete.calls()
            + self.metadata.insert.calls()
            + self.metadata.delete.calls()
    }
}
