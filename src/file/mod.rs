//! File management module for clouddrive.
//!
//! This module keeps a blob store and a metadata store consistent:
//! - Data model for file records and storage statistics
//! - Naming policy for storage keys
//! - Blob store clients (local filesystem, HTTP object store, in-memory)
//! - Metadata store clients (SQLite, in-memory)
//! - Write-ahead intent journal and startup recovery
//! - `FileManager`, which orders the two-store sequences and compensates
//!   on partial failure

mod http_storage;
mod journal;
mod memory;
mod metadata;
mod model;
mod naming;
mod service;
mod storage;

pub use http_storage::HttpBlobStore;
pub use journal::{Intent, IntentJournal, IntentToken, JournalEntry};
pub use memory::{MemoryBlobStore, MemoryMetadataStore};
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use model::{
    file_extension, resolve_mime_type, size_mb, FileRecord, NewFileRecord, StorageStats,
    DEFAULT_MIME_TYPE,
};
pub use naming::{derive, is_upload_path, NamingPolicy, StoredName, UPLOAD_PREFIX};
pub use service::{FileManager, ManagerConfig, RecoveryReport};
pub use storage::{BlobStore, LocalBlobStore};

/// Default maximum file size (10 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
